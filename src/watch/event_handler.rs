// src/watch/event_handler.rs

//! Event processing logic for file system changes.

use std::collections::BTreeSet;
use std::path::Path;

use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchProfile;

/// Steps whose pattern matches any path of `event`, deduplicated.
///
/// Pure reads (`Access` events) never trigger anything.
pub fn steps_for_event(root: &Path, event: &Event, profiles: &[WatchProfile]) -> BTreeSet<TaskName> {
    let mut steps = BTreeSet::new();
    if matches!(event.kind, EventKind::Access(_)) {
        return steps;
    }

    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            debug!(?path, "event path outside the project root");
            continue;
        };
        for profile in profiles.iter().filter(|p| p.matches(&rel)) {
            debug!(path = %rel, step = profile.step(), "watch match");
            steps.insert(profile.step().to_string());
        }
    }
    steps
}

/// Send an isolated `FileWatch` trigger for every matching step.
///
/// Returns `false` once the runtime channel is closed, at which point
/// there's no point keeping the watcher loop alive.
pub async fn process_event(
    root: &Path,
    event: &Event,
    profiles: &[WatchProfile],
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    for step in steps_for_event(root, event, profiles) {
        if let Err(err) = runtime_tx
            .send(RuntimeEvent::TaskTriggered {
                task: step,
                reason: TriggerReason::FileWatch,
            })
            .await
        {
            warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::build_watch_profiles;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn profiles() -> Vec<WatchProfile> {
        build_watch_profiles(&[
            ("scss/**/*.scss".to_string(), "scss".to_string()),
            ("js/*.js".to_string(), "js".to_string()),
            ("assets/svg/*.svg".to_string(), "svg-sprite".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn matching_paths_map_to_their_steps_once() {
        let root = Path::new("/project");
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path("/project/scss/a.scss".into())
            .add_path("/project/scss/partials/_b.scss".into())
            .add_path("/project/js/app.js".into());

        let steps = steps_for_event(root, &event, &profiles());
        assert_eq!(steps.into_iter().collect::<Vec<_>>(), vec!["js", "scss"]);
    }

    #[test]
    fn output_directories_do_not_retrigger() {
        let root = Path::new("/project");
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/project/web/assets/css/main.css".into());
        assert!(steps_for_event(root, &event, &profiles()).is_empty());
    }

    #[test]
    fn access_events_are_ignored() {
        let root = Path::new("/project");
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path("/project/js/app.js".into());
        assert!(steps_for_event(root, &event, &profiles()).is_empty());
    }

    #[tokio::test]
    async fn triggers_are_sent_as_file_watch() {
        let (tx, mut rx) = mpsc::channel(8);
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path("/project/assets/svg/arrow.svg".into());

        assert!(process_event(Path::new("/project"), &event, &profiles(), &tx).await);
        match rx.recv().await {
            Some(RuntimeEvent::TaskTriggered { task, reason }) => {
                assert_eq!(task, "svg-sprite");
                assert_eq!(reason, TriggerReason::FileWatch);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
