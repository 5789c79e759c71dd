use blockphys_server::server::headless;

/// Smoke test: server can run a few ticks without panicking.
#[tokio::test]
async fn server_runs_few_ticks() -> anyhow::Result<()> {
    let (mut server, _world) = headless(64)?;
    server.run_for_ticks(3).await?;
    assert_eq!(server.tick(), 3);
    Ok(())
}

/// `quit` from the console ends `run_for_ticks` early.
#[tokio::test]
async fn quit_ends_the_loop() -> anyhow::Result<()> {
    let (mut server, _world) = headless(64)?;
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    server.set_console_input(rx);
    tx.send("quit".to_string()).await?;

    server.run_for_ticks(50).await?;
    assert_eq!(server.tick(), 1);
    Ok(())
}
