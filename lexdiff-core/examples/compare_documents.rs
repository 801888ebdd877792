use lexdiff_core::{Config, Session};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexdiff_core=info".parse()?),
        )
        .init();

    let mut args = env::args().skip(1);
    let (Some(old), Some(new)) = (args.next(), args.next()) else {
        eprintln!("usage: compare_documents <OLD> <NEW> [QUESTION]");
        return Ok(());
    };
    let question = args
        .next()
        .unwrap_or_else(|| "What changed between the two versions?".to_string());

    let config = Config::load_or_default();
    let mut session = Session::new(config)?;
    let count = session.ingest(&old, &new).await?;
    println!("Indexed {} units\n", count);

    let comparison = session.compare(&question).await?;
    println!("{}\n", comparison.answer);

    for scored in &comparison.citations {
        println!(
            "[{}] Article {} ({:.3})",
            scored.unit.version,
            scored.unit.article_id.as_deref().unwrap_or("-"),
            scored.score
        );
    }

    Ok(())
}
