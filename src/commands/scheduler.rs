//! Parallel module execution.
//!
//! Modules run concurrently only when no two of them touch the same target
//! path; the engine holds no locks around shared filesystem paths.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::logging::{BufferedLog, Log, Logger};
use crate::module::Module;
use crate::tasks::{self, Context, Task};

/// Two modules that touch the same target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    /// Module seen first, in name order.
    pub first: String,
    /// Module that touches the same path.
    pub second: String,
    /// The shared path.
    pub path: PathBuf,
}

/// First pair of modules whose touched paths intersect, if any.
#[must_use]
pub fn find_overlap(modules: &[Module]) -> Option<Overlap> {
    let mut owners: HashMap<&Path, &str> = HashMap::new();
    for module in modules {
        for path in module.touched_paths() {
            match owners.get(path) {
                Some(&owner) if owner != module.name => {
                    return Some(Overlap {
                        first: owner.to_string(),
                        second: module.name.clone(),
                        path: path.to_path_buf(),
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(path, &module.name);
                }
            }
        }
    }
    None
}

/// Run tasks on the rayon pool.
///
/// Each task logs into its own [`BufferedLog`], replayed as one block when
/// the task finishes so concurrent modules never interleave on the console.
pub(super) fn run_tasks_parallel(tasks: &[&dyn Task], ctx: &Context, log: &Arc<Logger>) {
    tasks.par_iter().for_each(|&task| {
        log.notify_task_start(task.name());
        let buf = Arc::new(BufferedLog::new(Arc::clone(log)));
        let task_ctx = ctx.with_log(buf.clone() as Arc<dyn Log>);
        tasks::execute(task, &task_ctx);
        buf.flush_and_complete(task.name());
    });
}
