//! End-to-end scenarios across the pricing and inventory services.
//!
//! Verifies:
//! - Best-price resolution over tiers, discounts and overrides
//! - Ledger stock math, clamping and derived status
//! - Concurrent stock updates to one product lose no increments

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal_macros::dec;

    use freshcart_core::{ProductId, UserId};
    use freshcart_inventory::{StockStatus, TransactionType};
    use freshcart_pricing::PriceSource;

    use crate::error::ServiceError;
    use crate::ledger::{InventoryLedger, NewInventory, NewStockTransaction};
    use crate::pricing::{PricingAdmin, PricingResolver};
    use crate::store::{InMemoryStore, ProductStore};
    use crate::test_support::{clock, fixed_now, seed_product};

    type Store = Arc<InMemoryStore>;

    fn setup() -> (
        Store,
        PricingAdmin<Store>,
        PricingResolver<Store>,
        InventoryLedger<Store>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let clock = clock();
        (
            store.clone(),
            PricingAdmin::new(store.clone(), clock.clone()),
            PricingResolver::new(store.clone(), clock.clone()),
            InventoryLedger::new(store, clock),
        )
    }

    fn inventory(product_id: ProductId, initial: i64, reorder_point: i64) -> NewInventory {
        NewInventory {
            product_id,
            initial_stock_quantity: initial,
            min_stock_level: 0,
            max_stock_level: None,
            reorder_point,
            location_code: None,
        }
    }

    #[test]
    fn user_without_assignments_pays_baseline() {
        let (store, _, resolver, _) = setup();
        let product = seed_product(&store, "Greek Yogurt", dec!(10.00), None);
        assert_eq!(resolver.resolve_price(UserId::new(), product).unwrap(), dec!(10.00));
    }

    #[test]
    fn fifteen_percent_tier_on_ten_dollars() {
        let (store, admin, resolver, _) = setup();
        let product = seed_product(&store, "Greek Yogurt", dec!(10.00), None);
        let user = UserId::new();
        let tier = admin.create_tier("Wholesale", None, Some(dec!(15))).unwrap();
        admin.assign_tier(user, tier.id, fixed_now(), None).unwrap();

        assert_eq!(resolver.resolve_price(user, product).unwrap(), dec!(8.50));

        admin.create_override(product, tier.id, dec!(7.00)).unwrap();
        let q = resolver.quote_price(user, product).unwrap();
        assert_eq!(q.price, dec!(7.00));
        assert_eq!(q.source, PriceSource::Override { tier: tier.id });
    }

    #[test]
    fn cheapest_candidate_across_tiers_wins() {
        let (store, admin, resolver, _) = setup();
        let product = seed_product(&store, "Olive Oil", dec!(20.00), None);
        let user = UserId::new();

        let staff = admin.create_tier("Staff", None, Some(dec!(10))).unwrap();
        let partner = admin.create_tier("Partner", None, None).unwrap();
        admin.create_override(product, partner.id, dec!(17.50)).unwrap();
        admin.assign_tier(user, staff.id, fixed_now(), None).unwrap();
        admin.assign_tier(user, partner.id, fixed_now(), None).unwrap();

        // 10% off gives 18.00; the partner override is cheaper. No stacking.
        assert_eq!(resolver.resolve_price(user, product).unwrap(), dec!(17.50));
    }

    #[test]
    fn tier_math_starts_from_the_promotional_price() {
        let (store, admin, resolver, _) = setup();
        let product = seed_product(&store, "Granola", dec!(10.00), Some(dec!(8.00)));
        let user = UserId::new();
        let tier = admin.create_tier("Staff", None, Some(dec!(50))).unwrap();
        admin.assign_tier(user, tier.id, fixed_now(), None).unwrap();

        assert_eq!(resolver.resolve_price(user, product).unwrap(), dec!(4.00));
    }

    #[test]
    fn expired_assignment_is_ignored() {
        let (store, admin, resolver, _) = setup();
        let product = seed_product(&store, "Granola", dec!(10.00), None);
        let user = UserId::new();
        let tier = admin.create_tier("Launch", None, Some(dec!(40))).unwrap();
        admin
            .assign_tier(
                user,
                tier.id,
                fixed_now() - Duration::days(30),
                Some(fixed_now() - Duration::days(1)),
            )
            .unwrap();

        let q = resolver.quote_price(user, product).unwrap();
        assert_eq!(q.price, dec!(10.00));
        assert_eq!(q.source, PriceSource::Baseline);
    }

    #[test]
    fn duplicate_inventory_fails_and_leaves_state_unchanged() {
        let (store, _, _, ledger) = setup();
        let product = seed_product(&store, "Lentils", dec!(2.20), None);
        ledger.create_inventory(inventory(product, 15, 5)).unwrap();

        let err = ledger.create_inventory(inventory(product, 99, 1)).unwrap_err();
        assert_eq!(err, ServiceError::AlreadyExists("inventory"));

        let view = ledger.inventory(product).unwrap();
        assert_eq!(view.record.stock_quantity, 15);
        assert_eq!(view.record.reorder_point, 5);
        assert_eq!(ledger.transactions(product).unwrap().len(), 1);
    }

    #[test]
    fn overselling_clamps_stock_at_zero() {
        let (store, _, _, ledger) = setup();
        let product = seed_product(&store, "Avocados", dec!(1.25), None);
        ledger.create_inventory(inventory(product, 50, 10)).unwrap();

        let change = ledger
            .record_transaction(NewStockTransaction {
                product_id: product,
                transaction_type: TransactionType::Sold,
                quantity: 70,
                notes: None,
                reference: Some("ORD-7".to_string()),
                user_id: None,
            })
            .unwrap();

        assert_eq!(change.inventory.record.stock_quantity, 0);
        assert_eq!(change.inventory.status, StockStatus::OutOfStock);
        assert!(!store.get_product(product).unwrap().unwrap().in_stock());

        let history = ledger.transactions(product).unwrap();
        let kinds: Vec<(TransactionType, i64)> = history
            .iter()
            .map(|t| (t.transaction_type, t.quantity))
            .collect();
        assert_eq!(
            kinds,
            vec![(TransactionType::Sold, 70), (TransactionType::Received, 50)]
        );
    }

    #[test]
    fn each_stock_change_appends_exactly_one_ledger_row() {
        let (store, _, _, ledger) = setup();
        let product = seed_product(&store, "Carrots", dec!(0.80), None);
        ledger.create_inventory(inventory(product, 0, 2)).unwrap();

        ledger.update_stock_quantity(product, 6).unwrap();
        ledger.update_stock_quantity(product, -1).unwrap();
        ledger
            .record_transaction(NewStockTransaction {
                product_id: product,
                transaction_type: TransactionType::Damaged,
                quantity: 2,
                notes: Some("crushed crate".to_string()),
                reference: None,
                user_id: Some(UserId::new()),
            })
            .unwrap();

        let history = ledger.transactions(product).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].transaction_type, TransactionType::Damaged);
        assert_eq!(history[1].transaction_type, TransactionType::Adjusted);
        assert_eq!(history[1].quantity, -1);
        assert_eq!(history[2].transaction_type, TransactionType::Received);
        assert_eq!(ledger.inventory(product).unwrap().record.stock_quantity, 3);
    }

    #[test]
    fn stock_walks_from_in_stock_to_out_of_stock() {
        let (store, _, _, ledger) = setup();
        let product = seed_product(&store, "Spinach", dec!(2.99), None);

        let view = ledger.create_inventory(inventory(product, 20, 10)).unwrap();
        assert_eq!(view.status, StockStatus::InStock);
        assert!(store.get_product(product).unwrap().unwrap().in_stock());

        let change = ledger.update_stock_quantity(product, -15).unwrap();
        assert_eq!(change.inventory.record.stock_quantity, 5);
        assert_eq!(change.inventory.status, StockStatus::LowStock);
        assert!(store.get_product(product).unwrap().unwrap().in_stock());

        let change = ledger.update_stock_quantity(product, -10).unwrap();
        assert_eq!(change.inventory.record.stock_quantity, 0);
        assert_eq!(change.inventory.status, StockStatus::OutOfStock);
        assert!(!store.get_product(product).unwrap().unwrap().in_stock());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (store, _, _, ledger) = setup();
        let product = seed_product(&store, "Bread Rolls", dec!(0.45), None);
        ledger.create_inventory(inventory(product, 0, 5)).unwrap();

        let ledger = Arc::new(ledger.with_max_conflict_retries(10_000));
        let threads = 8;
        let per_thread = 25;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        ledger
                            .record_transaction(NewStockTransaction {
                                product_id: product,
                                transaction_type: TransactionType::Received,
                                quantity: 1,
                                notes: None,
                                reference: None,
                                user_id: None,
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let expected = (threads * per_thread) as i64;
        assert_eq!(ledger.inventory(product).unwrap().record.stock_quantity, expected);
        assert_eq!(ledger.transactions(product).unwrap().len(), expected as usize);
    }

    #[test]
    fn pricing_reads_run_alongside_admin_writes() {
        let (store, admin, resolver, _) = setup();
        let product = seed_product(&store, "Maple Syrup", dec!(12.00), None);
        let user = UserId::new();
        let tier = admin.create_tier("Staff", None, Some(dec!(25))).unwrap();
        admin.assign_tier(user, tier.id, fixed_now(), None).unwrap();

        let admin = Arc::new(admin);
        let writer = {
            let admin = admin.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let pct = if i % 2 == 0 { dec!(50) } else { dec!(25) };
                    admin.update_tier_discount(tier.id, Some(pct)).unwrap();
                }
            })
        };

        for _ in 0..50 {
            let price = resolver.resolve_price(user, product).unwrap();
            assert!(price == dec!(9.00) || price == dec!(6.00), "torn price {price}");
        }
        writer.join().unwrap();
    }
}
