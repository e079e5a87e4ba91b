use std::net::SocketAddr;

use tokio::net::TcpListener;

use ocrload_testserver::{DEFAULT_PREFIX, MockBehavior, TestServerStats, parse_job_script};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut prefix = DEFAULT_PREFIX.to_string();
    let mut behavior = MockBehavior::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--prefix" => {
                prefix = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--prefix requires a path, e.g. /api/v3"))?;
            }
            "--script" => {
                let raw = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--script requires steps, e.g. PENDING,PROCESSING,DONE")
                })?;
                behavior.job_script = parse_job_script(&raw)?;
            }
            "--sync-status" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--sync-status requires an http status"))?;
                behavior.sync_status = raw.parse()?;
            }
            "-h" | "--help" => {
                eprintln!(
                    "ocrload-testserver\n\nUSAGE:\n  ocrload-testserver [--bind 127.0.0.1:0] [--prefix /api/v3] [--script PENDING,PROCESSING,DONE] [--sync-status 200]\n\nOUTPUT:\n  Prints BASE_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = ocrload_testserver::router(&prefix, behavior, TestServerStats::default());

    println!("BASE_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
