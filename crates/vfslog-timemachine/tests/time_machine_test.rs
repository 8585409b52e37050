//! Integration tests for snapshot reconstruction from the operation log.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{machine, names, MAIN_RS, ROOT, SRC};
use vfslog_config::Config;
use vfslog_ops::testing::{log_from, CountingLog};
use vfslog_ops::{
    AttributeId, FileId, LogPosition, MemoryOperationLog, NameId, Operation, OperationLog, FREE_RECORD_FLAG,
};
use vfslog_timemachine::{NotAvailableCause, RecoveredChildren, SnapshotVariant, State, TimeMachine};

fn fill(file_id: FileId, name_id: NameId, parent_id: FileId) -> Operation {
    Operation::FillRecord {
        file_id,
        name_id,
        parent_id,
        length: 0,
        timestamp: 0,
        flags: 0,
        overwrite_attribute_ref: true,
    }
}

fn at(position: u64) -> LogPosition {
    LogPosition(position)
}

#[test]
fn test_parent_as_of_position() -> anyhow::Result<()> {
    let log = log_from([
        (5, Operation::SetParent { file_id: 7, parent_id: 1 }),
        (9, Operation::SetParent { file_id: 7, parent_id: 2 }),
    ])?;
    let machine = machine(Arc::new(log));

    let early = machine.get_snapshot(at(7));
    let late = machine.get_snapshot(at(12));
    assert_eq!(early.file_by_id(7).parent_id().get()?, &1);
    assert_eq!(late.file_by_id(7).parent_id().get()?, &2);
    Ok(())
}

#[test]
fn test_empty_log_knows_nothing() {
    let machine = machine(Arc::new(MemoryOperationLog::new()));

    for position in [LogPosition::ZERO, at(100)] {
        let snapshot = machine.get_snapshot(position);
        for file_id in [0, 1, 7, 1000] {
            let file = snapshot.file_by_id(file_id);
            assert!(!file.name_id().is_ready());
            assert!(!file.name().is_ready());
            assert!(!file.parent_id().is_ready());
            assert!(!file.parent().is_ready());
            assert!(!file.length().is_ready());
            assert!(!file.timestamp().is_ready());
            assert!(!file.flags().is_ready());
            assert!(!file.content_record_id().is_ready());
            assert!(!file.attributes_record_id().is_ready());
            assert!(!file.content().is_ready());
            assert!(!file.read_attribute(&AttributeId::new("stamp")).is_ready());
            assert!(!file.path().is_ready());
        }
    }
    assert!(!machine
        .sentinel()
        .file_by_id(1)
        .recoverable_children_ids()
        .is_ready());
}

#[test]
fn test_root_has_no_parent() -> anyhow::Result<()> {
    let log = log_from([(1, fill(3, 42, 0))])?;
    let machine = machine(Arc::new(log));

    let snapshot = machine.get_snapshot(at(2));
    let file = snapshot.file_by_id(3);
    assert!(matches!(file.parent(), State::Ready(None)));
    assert_eq!(file.name().get()?, "main.rs");
    assert_eq!(file.path().get()?, "main.rs");
    Ok(())
}

#[test]
fn test_not_available_cause_distinguishes_invalid_entries() -> anyhow::Result<()> {
    let mut log = log_from([(1, Operation::SetNameId { file_id: 1, name_id: 42 })])?;
    log.append_invalid_at(at(20), "torn write")?;
    let machine = machine(Arc::new(log));

    let snapshot = machine.get_snapshot(at(30));
    assert_eq!(
        snapshot.file_by_id(9).name_id().cause(),
        Some(&NotAvailableCause::ScanExhausted { invalid_skipped: 1 })
    );
    assert_eq!(snapshot.file_by_id(1).name_id().get()?, &42);
    Ok(())
}

#[test]
fn test_property_scans_once() -> anyhow::Result<()> {
    let log = log_from([
        (1, Operation::SetNameId { file_id: 7, name_id: 42 }),
        (10, Operation::SetParent { file_id: 7, parent_id: 1 }),
        (20, Operation::SetLength { file_id: 7, length: 4 }),
    ])?;
    let counting = Arc::new(CountingLog::new(log));
    let machine = machine(counting.clone());

    let snapshot = machine.get_snapshot(at(30));
    let file = snapshot.file_by_id(7);
    assert_eq!(file.name_id().get()?, &42);
    let reads = counting.reads();
    assert_eq!(reads, 3);

    for _ in 0..5 {
        assert_eq!(file.name_id().get()?, &42);
        assert_eq!(machine.get_snapshot(at(30)).file_by_id(7).name_id().get()?, &42);
    }
    assert_eq!(counting.reads(), reads);
    assert_eq!(counting.iterators_opened(), 1);
    Ok(())
}

#[test]
fn test_independent_machines_agree() -> anyhow::Result<()> {
    let mut log = MemoryOperationLog::new();
    let mut positions = Vec::new();
    for round in 0..20 {
        positions.push(log.append(Operation::SetNameId {
            file_id: round % 3,
            name_id: round,
        }));
    }
    positions.push(log.end());
    let log: Arc<dyn OperationLog> = Arc::new(log);

    let first = machine(Arc::clone(&log));
    let second = machine(Arc::clone(&log));
    // Different cache histories must not change answers
    let _warm = first.get_snapshot(positions[10]);

    for position in positions.iter().rev() {
        for file_id in 0..3 {
            let a = first.get_snapshot(*position).file_by_id(file_id).name_id().clone();
            let b = second.get_snapshot(*position).file_by_id(file_id).name_id().clone();
            assert_eq!(a, b, "file {file_id} at {position}");
        }
    }
    Ok(())
}

#[test]
fn test_later_mutations_are_invisible() -> anyhow::Result<()> {
    let log = log_from([
        (10, Operation::SetNameId { file_id: 7, name_id: 42 }),
        (20, Operation::SetNameId { file_id: 7, name_id: 43 }),
        (30, Operation::CleanRecord { file_id: 7 }),
    ])?;
    let machine = machine(Arc::new(log));

    let at_20 = machine.get_snapshot(at(20));
    assert_eq!(at_20.file_by_id(7).name().get()?, "main.rs");

    let at_21 = machine.get_snapshot(at(21));
    assert_eq!(at_21.file_by_id(7).name().get()?, "lib.rs");

    let at_31 = machine.get_snapshot(at(31));
    let cleaned = at_31.file_by_id(7);
    assert_eq!(cleaned.name_id().get()?, &0);
    assert_eq!(cleaned.name().cause(), Some(&NotAvailableCause::UnknownNameId(0)));
    Ok(())
}

/// Log with the length of file 1 set at position 3 and unrelated noise at
/// every other position up to 59
fn noisy_log() -> anyhow::Result<MemoryOperationLog> {
    let entries = (1..60u64).map(|position| {
        let op = if position == 3 {
            Operation::SetLength { file_id: 1, length: 100 }
        } else {
            Operation::SetLength {
                file_id: 2,
                length: position as i64,
            }
        };
        (position, op)
    });
    Ok(log_from(entries)?)
}

#[test]
fn test_scan_stops_at_closest_cached_snapshot() -> anyhow::Result<()> {
    let counting = Arc::new(CountingLog::new(noisy_log()?));
    let machine = machine(counting.clone());

    let ten = machine.get_snapshot(at(10));
    let _fifty = machine.get_snapshot(at(50));
    assert_eq!(ten.file_by_id(1).length().get()?, &100);

    counting.reset();
    let forty = machine.get_snapshot(at(40));
    assert_eq!(forty.file_by_id(1).length().get()?, &100);

    assert_eq!(counting.reads(), 30);
    assert!(counting.lowest_touched().is_some_and(|p| p >= at(10)));
    assert!(counting.touched_positions().iter().all(|p| *p < at(40)));
    Ok(())
}

#[test]
fn test_chained_scans_read_each_entry_once() -> anyhow::Result<()> {
    let counting = Arc::new(CountingLog::new(noisy_log()?));
    let machine = machine(counting.clone());

    let ten = machine.get_snapshot(at(10));
    let forty = machine.get_snapshot(at(40));
    assert_eq!(forty.file_by_id(1).length().get()?, &100);
    assert!(ten.file_by_id_if_exists(1).is_some());

    let touched = counting.touched_positions();
    let unique: BTreeSet<_> = touched.iter().copied().collect();
    assert_eq!(touched.len(), unique.len());
    assert_eq!(counting.lowest_touched(), Some(at(3)));
    Ok(())
}

#[test]
fn test_released_snapshots_are_rebuilt() -> anyhow::Result<()> {
    let log = log_from([(1, fill(MAIN_RS, 42, SRC))])?;
    let machine = machine(Arc::new(log));

    let snapshot = machine.get_snapshot(at(5));
    assert_eq!(snapshot.file_by_id(MAIN_RS).parent_id().get()?, &SRC);
    assert_eq!(machine.cached_positions(), vec![at(5)]);
    drop(snapshot);
    assert_eq!(machine.cache_len(), 0);

    let rebuilt = machine.get_snapshot(at(5));
    assert_eq!(rebuilt.variant(), SnapshotVariant::CacheAware);
    assert_eq!(rebuilt.file_by_id(MAIN_RS).parent_id().get()?, &SRC);
    Ok(())
}

#[test]
fn test_newest_snapshot_does_not_retain_older_ones() -> anyhow::Result<()> {
    let mut log = MemoryOperationLog::new();
    let mut ends = Vec::new();
    for length in 0..100 {
        log.append(Operation::SetLength { file_id: 1, length });
        ends.push(log.end());
    }
    let machine = machine(Arc::new(log));

    let mut current = None;
    for (length, end) in ends.iter().enumerate() {
        let snapshot = machine.get_snapshot(*end);
        assert_eq!(snapshot.file_by_id(1).length().get()?, &(length as i64));
        assert_eq!(
            snapshot.file_by_id(2).length().cause(),
            Some(&NotAvailableCause::ScanExhausted { invalid_skipped: 0 })
        );
        current = Some(snapshot);
        assert_eq!(machine.cache_len(), 1);
    }
    assert_eq!(machine.cached_positions(), vec![ends[99]]);
    drop(current);
    assert_eq!(machine.cache_len(), 0);
    Ok(())
}

fn content_log() -> anyhow::Result<MemoryOperationLog> {
    Ok(log_from([
        (1, fill(5, 42, 0)),
        (2, Operation::AcquireNewContentRecord { record_id: 9 }),
        (3, Operation::SetContentRecordId { file_id: 5, content_record_id: 9 }),
        (4, Operation::WriteContent { record_id: 9, data: b"hello".to_vec() }),
        (10, Operation::AppendContent { record_id: 9, data: b" world".to_vec() }),
        (20, Operation::ReplaceContentBytes { record_id: 9, offset: 0, data: b"J".to_vec() }),
        (30, Operation::CleanRecord { file_id: 5 }),
    ])?)
}

#[test]
fn test_content_restored_across_snapshots() -> anyhow::Result<()> {
    let machine = machine(Arc::new(content_log()?));

    let before_record = machine.get_snapshot(at(3));
    assert!(!before_record.file_by_id(5).content().is_ready());

    let acquired = machine.get_snapshot(at(4));
    assert_eq!(acquired.file_by_id(5).content().get()?, b"");

    let written = machine.get_snapshot(at(5));
    assert_eq!(written.file_by_id(5).content().get()?, b"hello");

    let appended = machine.get_snapshot(at(11));
    assert_eq!(appended.file_by_id(5).content().get()?, b"hello world");

    // Window [11, 21) holds only the replace; the base comes from @11
    let replaced = machine.get_snapshot(at(21));
    assert_eq!(replaced.file_by_id(5).content().get()?, b"Jello world");
    assert_eq!(replaced.content_by_record(9).get()?, b"Jello world");

    let cleaned = machine.get_snapshot(at(31));
    assert_eq!(
        cleaned.file_by_id(5).content().cause(),
        Some(&NotAvailableCause::NoContentRecord)
    );
    Ok(())
}

#[test]
fn test_inconsistent_content_is_not_available() -> anyhow::Result<()> {
    let log = log_from([
        (1, Operation::WriteContent { record_id: 4, data: b"ab".to_vec() }),
        (2, Operation::ReplaceContentBytes { record_id: 4, offset: 5, data: b"x".to_vec() }),
    ])?;
    let machine = machine(Arc::new(log));
    let state = machine.get_snapshot(at(3)).content_by_record(4);
    assert!(matches!(state.cause(), Some(NotAvailableCause::InconsistentContent(_))));
    Ok(())
}

#[test]
fn test_attribute_data() -> anyhow::Result<()> {
    let stamp = AttributeId::new("indexing.stamp");
    let log = log_from([
        (30, Operation::WriteAttribute { file_id: 5, attribute: stamp.clone(), data: vec![1, 2] }),
        (35, Operation::WriteAttribute { file_id: 5, attribute: AttributeId::new("other"), data: vec![9] }),
        (40, Operation::DeleteAttributes { file_id: 5 }),
        (50, Operation::SetAttributeRecordId { file_id: 5, attribute_record_id: 12 }),
    ])?;
    let machine = machine(Arc::new(log));

    let before = machine.get_snapshot(at(25));
    assert!(matches!(
        before.file_by_id(5).read_attribute(&stamp).cause(),
        Some(NotAvailableCause::ScanExhausted { .. })
    ));

    let written = machine.get_snapshot(at(36));
    assert_eq!(written.file_by_id(5).read_attribute(&stamp), State::Ready(Some(vec![1, 2])));

    let deleted = machine.get_snapshot(at(41));
    assert_eq!(deleted.file_by_id(5).read_attribute(&stamp), State::Ready(None));

    let late = machine.get_snapshot(at(51));
    let file = late.file_by_id(5);
    assert_eq!(file.attributes_record_id().get()?, &12);
    assert_eq!(file.read_attribute(&stamp), State::Ready(None));
    Ok(())
}

fn tree_log() -> anyhow::Result<MemoryOperationLog> {
    Ok(log_from([
        (1, fill(ROOT, 1, 0)),
        (2, fill(SRC, 2, ROOT)),
        (3, fill(MAIN_RS, 42, SRC)),
        (4, fill(4, 43, ROOT)),
        (10, Operation::SetParent { file_id: 4, parent_id: SRC }),
        (20, Operation::SetFlags { file_id: MAIN_RS, flags: FREE_RECORD_FLAG }),
    ])?)
}

#[test]
fn test_recoverable_children() -> anyhow::Result<()> {
    let machine = machine(Arc::new(tree_log()?));

    let early = machine.get_snapshot(at(5));
    assert_eq!(
        early.file_by_id(ROOT).recoverable_children_ids().get()?,
        &RecoveredChildren {
            ids: BTreeSet::from([SRC, 4]),
            complete: true,
        }
    );

    let late = machine.get_snapshot(at(11));
    assert_eq!(late.file_by_id(ROOT).recoverable_children_ids().get()?.ids, BTreeSet::from([SRC]));
    assert_eq!(
        late.file_by_id(SRC).recoverable_children_ids().get()?.ids,
        BTreeSet::from([MAIN_RS, 4])
    );
    Ok(())
}

#[test]
fn test_path_and_deletion() -> anyhow::Result<()> {
    let machine = machine(Arc::new(tree_log()?));

    let snapshot = machine.get_snapshot(at(15));
    let main = snapshot.file_by_id(MAIN_RS);
    assert_eq!(main.path().get()?, "project/src/main.rs");
    assert_eq!(snapshot.file_by_id(4).path().get()?, "project/src/lib.rs");
    assert_eq!(main.is_deleted(), State::Ready(false));

    let parent = main.parent().into_option().flatten().expect("parent");
    assert!(Arc::ptr_eq(&parent, &snapshot.file_by_id(SRC)));

    let after = machine.get_snapshot(at(21));
    assert_eq!(after.file_by_id(MAIN_RS).is_deleted(), State::Ready(true));
    Ok(())
}

#[test]
fn test_parent_cycle_is_reported() -> anyhow::Result<()> {
    let log = log_from([(1, fill(5, 42, 6)), (2, fill(6, 43, 5))])?;
    let machine = machine(Arc::new(log));
    let snapshot = machine.get_snapshot(at(3));
    assert_eq!(
        snapshot.file_by_id(5).path().cause(),
        Some(&NotAvailableCause::ParentCycle(5))
    );
    Ok(())
}

#[test]
fn test_strict_mode_refuses_to_cross_unreadable_entries() -> anyhow::Result<()> {
    let mut log = log_from([(1, Operation::SetNameId { file_id: 1, name_id: 42 })])?;
    log.append_invalid_at(at(5), "torn write")?;
    log.pad_to(at(20));
    let log: Arc<dyn OperationLog> = Arc::new(log);

    let lenient = machine(Arc::clone(&log));
    let strict = TimeMachine::builder(Arc::clone(&log), names())
        .config(&Config::default())
        .strict_invalid_records(true)
        .build();

    let anchors = [lenient.get_snapshot(at(3)), strict.get_snapshot(at(3))];
    for anchor in &anchors {
        assert_eq!(anchor.file_by_id(1).name_id().get()?, &42);
    }

    assert_eq!(lenient.get_snapshot(at(10)).file_by_id(1).name_id().get()?, &42);
    assert_eq!(
        strict.get_snapshot(at(10)).file_by_id(1).name_id().cause(),
        Some(&NotAvailableCause::UnreadableOperations { count: 1 })
    );
    Ok(())
}

#[test]
fn test_concurrent_readers_share_results() -> anyhow::Result<()> {
    let mut log = MemoryOperationLog::new();
    for round in 0..200 {
        log.append(Operation::SetLength {
            file_id: round % 10,
            length: i64::from(round),
        });
    }
    let end = log.end();
    let counting = Arc::new(CountingLog::new(log));
    let machine = machine(counting.clone());
    let snapshot = machine.get_snapshot(end);

    let results: Vec<Vec<i64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let machine = machine.clone();
                s.spawn(move || {
                    let snapshot = machine.get_snapshot(end);
                    (0..10)
                        .map(|file_id| *snapshot.file_by_id(file_id).length().get().unwrap())
                        .collect::<Vec<i64>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: Vec<i64> = (190..200).collect();
    assert!(results.iter().all(|r| *r == expected));
    assert_eq!(counting.iterators_opened(), 10);
    assert!(Arc::ptr_eq(&snapshot, &machine.get_snapshot(end)));
    Ok(())
}
