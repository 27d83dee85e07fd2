use super::*;

#[tokio::test]
async fn test_shutdown_rejects_new_tasks() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(MockProvider::new(1)), 20).await;
    assert!(downloader.is_accepting_tasks());

    downloader.shutdown().await.unwrap();

    assert!(!downloader.is_accepting_tasks());
    let result = downloader.create_task("b1").await;
    assert!(matches!(result, Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn test_shutdown_stops_running_tasks_at_chunk_boundary() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let provider = Arc::new(MockProvider::new(50).gated(gate.clone()));
    let (downloader, _temp_dir) = create_test_downloader(provider.clone(), 20).await;
    let mut events = downloader.subscribe();

    let id = downloader.create_task("b1").await.unwrap();
    wait_for_started(&provider, 20).await;

    let shutting_down = downloader.clone();
    let shutdown = tokio::spawn(async move { shutting_down.shutdown().await });

    // release the chunk only once the stop signal is in place
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let cancelled = downloader
            .registry
            .with_entry(&id, |entry| entry.cancel.is_cancelled())
            .await
            .unwrap();
        if cancelled {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "stop signal never sent");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    gate.add_permits(100);

    shutdown.await.unwrap().unwrap();

    let task = downloader.get_task_status(&id).await.unwrap();
    assert_eq!(task.state, TaskState::Stopped);
    assert_eq!(provider.requested().len(), 20);
    assert_eq!(downloader.checkpoints.load("b1").await.unwrap().downloaded, 20);

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::Shutdown) {
            saw_shutdown = true;
        }
    }
    assert!(saw_shutdown);
}

#[tokio::test]
async fn test_resume_rejected_after_shutdown() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let provider = Arc::new(MockProvider::new(30).gated(gate.clone()));
    let (downloader, _temp_dir) = create_test_downloader(provider.clone(), 20).await;

    let id = downloader.create_task("b1").await.unwrap();
    wait_for_started(&provider, 20).await;
    downloader.stop_task(&id).await.unwrap();
    gate.add_permits(100);
    wait_for_state(&downloader, &id, TaskState::Stopped).await;

    downloader.shutdown().await.unwrap();

    let result = downloader.resume_task(&id).await;
    assert!(matches!(result, Err(Error::ShuttingDown)));
}
