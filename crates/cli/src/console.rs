//! Operator console on stdin.

use {
    chatsync_sync::{DumpDirs, SyncCoordinator, control},
    tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    tracing::{info, warn},
};

pub async fn run(coordinator: &SyncCoordinator, dirs: &DumpDirs) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = serve(coordinator, dirs, stdin, |line| println!("{line}")) => result?,
        interrupted = tokio::signal::ctrl_c() => {
            if let Err(e) = interrupted {
                warn!(error = %e, "cannot listen for ctrl-c");
            }
            info!("interrupted");
        },
    }
    coordinator.shutdown().await;
    Ok(())
}

/// Runs console lines until `shutdown` or end of input.
async fn serve<R, F>(
    coordinator: &SyncCoordinator,
    dirs: &DumpDirs,
    input: R,
    mut print: F,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&str),
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = control::handle_line(coordinator, dirs, &line).await;
        for text in &reply.lines {
            print(text);
        }
        if reply.shutdown {
            return Ok(());
        }
    }
    info!("console closed");
    Ok(())
}
