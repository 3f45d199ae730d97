use clap::Parser;
use dotenvy::dotenv;
use file_share_access::config::AccessConfig;
use file_share_access::infrastructure::{database, seed};
use file_share_access::models::Role;
use file_share_access::utils::auth::create_jwt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Registers a user if needed and prints a bearer token for it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Email of the user to issue a token for
    #[arg(short, long)]
    email: String,

    /// Role assigned when the user does not exist yet
    #[arg(short, long, default_value = "USER")]
    role: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    ttl_hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let role: Role = args.role.parse().map_err(anyhow::Error::msg)?;
    let config = AccessConfig::from_env();

    let db = database::setup_database().await?;
    let user = seed::ensure_user(&db, &args.email, role).await?;
    let token = create_jwt(&user.id, &config.jwt_secret, args.ttl_hours)?;

    info!("🔐 Issued token for {} ({})", user.email, user.role);
    println!("{}", token);

    Ok(())
}
