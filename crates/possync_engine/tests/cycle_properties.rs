//! Property tests for full cycles over generated record sets.

use possync_core::Mutation;
use possync_protocol::{ActionOp, EntityKind, RecordSet};
use possync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cycle_keeps_every_inventory_id(
        local in inventory_set_strategy(),
        remote in inventory_set_strategy(),
    ) {
        let terminal = TestTerminal::new();
        for item in &local {
            terminal
                .db
                .apply(Mutation::new(ActionOp::Create, item.clone()).confirmed(), None)
                .unwrap();
        }
        terminal.remote.seed(TEST_OWNER, RecordSet::InventoryItem(remote.clone()));

        terminal.sync().unwrap();

        let expected: BTreeSet<String> = local
            .iter()
            .chain(remote.iter())
            .map(|item| item.id.clone())
            .collect();
        let merged = terminal.local(EntityKind::InventoryItem);
        let merged_ids: BTreeSet<String> = merged.ids().into_iter().map(str::to_string).collect();
        prop_assert_eq!(merged.len(), expected.len());
        prop_assert_eq!(&merged_ids, &expected);
        prop_assert_eq!(terminal.remote_records(EntityKind::InventoryItem).len(), expected.len());
    }

    #[test]
    fn second_cycle_changes_nothing(
        local in expense_set_strategy(),
        remote in expense_set_strategy(),
    ) {
        let terminal = TestTerminal::new();
        for expense in &local {
            terminal.db.create(expense.clone(), Some(&terminal.identity)).unwrap();
        }
        terminal.remote.seed(TEST_OWNER, RecordSet::Expense(remote));

        terminal.sync().unwrap();
        let after_first = terminal.local(EntityKind::Expense);
        terminal.sync().unwrap();

        let after_second = terminal.local(EntityKind::Expense);
        prop_assert_eq!(after_second.len(), after_first.len());
        for id in after_first.ids() {
            prop_assert_eq!(after_second.get(id), after_first.get(id));
        }
        prop_assert!(terminal.queued().is_empty());
    }
}
