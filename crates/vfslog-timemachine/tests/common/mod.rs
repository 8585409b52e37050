//! Shared fixtures for the time machine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use vfslog_config::Config;
use vfslog_ops::{FileId, NameId, NameResolver, OperationLog};
use vfslog_timemachine::{GroundTruth, TimeMachine};

pub const ROOT: FileId = 1;
pub const SRC: FileId = 2;
pub const MAIN_RS: FileId = 3;

/// Name table shared by the log fixtures
pub fn names() -> Arc<dyn NameResolver> {
    Arc::new(|name_id: NameId| -> Option<String> {
        let name = match name_id {
            1 => "project",
            2 => "src",
            42 => "main.rs",
            43 => "lib.rs",
            _ => return None,
        };
        Some(name.to_string())
    })
}

/// Time machine with default settings, independent of the global config
pub fn machine(log: Arc<dyn OperationLog>) -> TimeMachine {
    TimeMachine::builder(log, names()).config(&Config::default()).build()
}

/// In-memory stand-in for the live VFS
#[derive(Default)]
pub struct LiveVfs {
    pub name_ids: HashMap<FileId, NameId>,
    pub parents: HashMap<FileId, FileId>,
    pub lengths: HashMap<FileId, i64>,
}

impl GroundTruth for LiveVfs {
    fn name_id(&self, file_id: FileId) -> Option<NameId> {
        self.name_ids.get(&file_id).copied()
    }

    fn name_by_name_id(&self, name_id: NameId) -> Option<String> {
        names().name_of(name_id)
    }

    fn parent_id(&self, file_id: FileId) -> Option<FileId> {
        self.parents.get(&file_id).copied()
    }

    fn length(&self, file_id: FileId) -> Option<i64> {
        self.lengths.get(&file_id).copied()
    }
}
