//! Integration tests for ActiveContextController
//!
//! Tests cover:
//! - Guessed placeholder replacement and its single destruction
//! - Lifecycle notifications and render confirmation
//! - Fallback to absent when the active context goes away
//! - Repository creation and cloning flows
//! - Serialization and deactivation

use crate::integration::test_utils::{make_dir, make_repo, workdir, Harness};
use std::time::Duration;
use wdctx::events::EVENT_CHANNEL_CAPACITY;
use wdctx::{
    ActiveContextEvent, ControllerState, GuessCriteria, PaneItem, RepositoryState, SavedState,
    Workspace,
};

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}

#[tokio::test]
async fn test_first_update_replaces_guessed_context() {
    let h = Harness::with_criteria(GuessCriteria {
        project_path_count: 1,
        init_path_count: 0,
    });
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);

    let guessed = h.controller.active_context();
    assert!(guessed.is_guessed());
    assert_eq!(guessed.repository_state(), RepositoryState::LoadingGuess);
    assert!(matches!(h.controller.state(), ControllerState::Guessed));

    h.controller.schedule_update(SavedState::default()).await.unwrap();

    assert_eq!(h.active_workdir(), Some(workdir(&a)));
    assert!(guessed.is_destroyed());
    assert!(!guessed.destroy(), "guessed context is destroyed exactly once");
    assert!(matches!(h.controller.state(), ControllerState::Active(_)));
    assert_eq!(h.presenter.rendered(), vec![workdir(&a).to_string()]);
}

#[tokio::test]
async fn test_update_notifications_in_order() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    let mut events = h.controller.subscribe();

    h.controller.schedule_update(SavedState::default()).await.unwrap();
    h.controller.schedule_update(SavedState::default()).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            ActiveContextEvent::Scheduled { update: 1 },
            ActiveContextEvent::Began { update: 1 },
            ActiveContextEvent::ContextChangeRendered { update: 1 },
            ActiveContextEvent::Finished {
                update: 1,
                changed: true
            },
            ActiveContextEvent::Scheduled { update: 2 },
            ActiveContextEvent::Began { update: 2 },
            ActiveContextEvent::Finished {
                update: 2,
                changed: false
            },
        ]
    );
    // Same context again is a no-op for the presenter.
    assert_eq!(h.presenter.rendered().len(), 1);
}

#[tokio::test]
async fn test_closing_every_project_falls_back_to_absent() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    h.controller.schedule_update(SavedState::default()).await.unwrap();
    let previous = h.controller.active_context();

    h.workspace.remove_project_path(&a);
    h.controller.schedule_update(SavedState::default()).await.unwrap();

    assert!(h.controller.active_context().is_absent());
    assert!(previous.is_destroyed());
    assert_eq!(h.factory.repositories_for(&a)[0].destroy_calls(), 1);
    assert!(h.controller.pool().is_empty());
}

#[tokio::test]
async fn test_active_context_outlives_its_residency_until_swap() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    let b = make_repo(h.root(), "b");
    let c = make_repo(h.root(), "c");
    h.workspace.set_project_paths(vec![a.clone(), b.clone()]);
    h.workspace
        .set_active_item(Some(PaneItem::HasWorkingDirectory(a.clone())));
    h.controller.schedule_update(SavedState::default()).await.unwrap();
    let previous = h.controller.active_context();
    assert_eq!(previous.working_directory(), Some(&workdir(&a)));

    h.workspace.set_project_paths(vec![b.clone(), c.clone()]);
    h.workspace.set_active_item(None);
    h.controller.schedule_update(SavedState::default()).await.unwrap();

    assert!(h.controller.active_context().is_absent());
    assert!(previous.is_destroyed());
    assert_eq!(h.factory.repositories_for(&a)[0].destroy_calls(), 1);
}

#[tokio::test]
async fn test_destroyed_active_context_falls_back_to_absent() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    h.controller.schedule_update(SavedState::default()).await.unwrap();

    let active = h.controller.active_context();
    assert!(active.destroy());

    wait_until(|| h.controller.active_context().is_absent()).await;
    assert!(matches!(
        h.controller.active_repository().map(|repo| repo.state()),
        Ok(RepositoryState::Absent)
    ));
}

#[tokio::test]
async fn test_destruction_missed_by_lagging_listener_still_falls_back() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    let b = make_repo(h.root(), "b");
    h.workspace.set_project_paths(vec![a.clone(), b.clone()]);
    h.workspace
        .set_active_item(Some(PaneItem::HasWorkingDirectory(a.clone())));
    h.controller.schedule_update(SavedState::default()).await.unwrap();

    let active = h.controller.active_context();
    let other = h.controller.pool().get(&workdir(&b));
    // No await in between: the listener only runs after the destruction
    // notice has been pushed out of the channel.
    assert!(active.destroy());
    for _ in 0..EVENT_CHANNEL_CAPACITY * 2 {
        other.report_repository_update();
    }

    wait_until(|| h.controller.active_context().is_absent()).await;
    assert!(!other.is_destroyed());
}

#[tokio::test]
async fn test_update_skipped_after_workspace_teardown() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    h.workspace.destroy();

    h.controller.schedule_update(SavedState::default()).await.unwrap();

    assert!(h.controller.active_context().is_guessed());
    assert_eq!(h.factory.open_count(), 0);
    assert!(h.presenter.rendered().is_empty());
}

#[tokio::test]
async fn test_create_repository_for_existing_project() {
    let h = Harness::new();
    let plain = make_dir(h.root(), "plain");
    h.workspace.add_project_path(&plain);
    h.controller.schedule_update(SavedState::default()).await.unwrap();
    assert_eq!(
        h.controller.active_context().repository_state(),
        RepositoryState::Empty
    );

    h.controller
        .create_repository_for_project_path(&plain)
        .await
        .unwrap();

    assert_eq!(h.workspace.project_paths(), vec![plain.clone()]);
    assert_eq!(h.active_workdir(), Some(workdir(&plain)));
    assert_eq!(
        h.controller.active_context().repository_state(),
        RepositoryState::Present
    );
    // The recorded "no repository" answer was dropped.
    assert_eq!(
        h.controller.cache().find(&plain).await,
        Some(workdir(&plain))
    );
}

#[tokio::test]
async fn test_create_repository_selects_previously_focused_document() {
    let h = Harness::new();
    let plain = make_dir(h.root(), "plain");
    let b = make_repo(h.root(), "b");
    let document = plain.join("a.rs");
    std::fs::write(&document, "fn main() {}").unwrap();
    h.workspace.set_project_paths(vec![plain.clone(), b.clone()]);
    h.workspace
        .set_active_item(Some(PaneItem::HasFilePath(document.clone())));

    h.controller.schedule_update(SavedState::default()).await.unwrap();
    assert_eq!(h.controller.cache().find(&document).await, None);

    h.controller
        .create_repository_for_project_path(&plain)
        .await
        .unwrap();

    assert_eq!(
        h.controller.cache().find(&document).await,
        Some(workdir(&plain))
    );
    assert_eq!(h.active_workdir(), Some(workdir(&plain)));
}

#[tokio::test]
async fn test_create_repository_for_new_directory() {
    let h = Harness::new();
    let target = h.root().join("fresh").join("project");

    h.controller
        .create_repository_for_project_path(&target)
        .await
        .unwrap();

    assert!(target.join(".git").is_dir());
    assert_eq!(h.workspace.project_paths(), vec![target.clone()]);
    assert_eq!(h.active_workdir(), Some(workdir(&target)));
}

#[tokio::test]
async fn test_clone_repository_with_detached_handle() {
    let h = Harness::new();
    let target = h.root().join("cloned");
    let url = "https://example.com/widgets.git";

    h.controller
        .clone_repository_for_project_path(url, &target)
        .await
        .unwrap();

    let repositories = h.factory.repositories_for(&target);
    assert_eq!(repositories.len(), 2);
    assert_eq!(repositories[0].cloned_from().as_deref(), Some(url));
    assert_eq!(repositories[0].destroy_calls(), 1);
    assert_eq!(h.active_workdir(), Some(workdir(&target)));
    assert_eq!(
        h.controller.active_context().repository_state(),
        RepositoryState::Present
    );
}

#[tokio::test]
async fn test_serialize_captures_active_path_and_progress() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    h.controller.schedule_update(SavedState::default()).await.unwrap();
    h.controller
        .active_context()
        .with_resolution_progress(|progress| progress.report_marker_count("src/lib.rs", 3))
        .unwrap();

    let saved = h.controller.serialize();
    let key = workdir(&a).to_string();
    assert_eq!(saved.active_repository_path.as_deref(), Some(key.as_str()));
    assert!(!saved.first_run);
    assert!(saved.saved_at.is_some());
    assert_eq!(
        saved.resolution_progress_by_path[&key].paths.get("src/lib.rs"),
        Some(&3)
    );
    assert_eq!(
        h.controller.active_resolution_progress().unwrap().paths.len(),
        1
    );
}

#[tokio::test]
async fn test_saved_state_restores_previous_repository() {
    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    let b = make_repo(h.root(), "b");
    h.workspace.set_project_paths(vec![a.clone(), b.clone()]);

    let saved = SavedState {
        active_repository_path: Some(workdir(&b).to_string()),
        first_run: false,
        ..SavedState::default()
    };
    h.controller.schedule_update(saved).await.unwrap();

    assert_eq!(h.active_workdir(), Some(workdir(&b)));
    assert_eq!(h.controller.pool().len(), 2);
}

#[tokio::test]
async fn test_deactivate_destroys_pool_and_guess() {
    let h = Harness::new();
    let guessed = h.controller.active_context();
    h.controller.deactivate().await.unwrap();
    assert!(guessed.is_destroyed());

    let h = Harness::new();
    let a = make_repo(h.root(), "a");
    h.workspace.add_project_path(&a);
    h.controller.schedule_update(SavedState::default()).await.unwrap();
    let active = h.controller.active_context();

    h.controller.deactivate().await.unwrap();
    assert!(active.is_destroyed());
    assert!(h.controller.pool().is_empty());
    assert_eq!(h.factory.repositories_for(&a)[0].destroy_calls(), 1);
}
