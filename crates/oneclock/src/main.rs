use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use oneclock_core::artifacts;
use oneclock_core::clock::{self, Punch};
use oneclock_core::login::login_with_restart;
use oneclock_core::notify::notify;
use oneclock_core::{AuthConfig, Driver, PasscodeSource};
use oneclock_h::HeadlessDriver;

#[derive(Parser)]
#[command(name = "oneclock", version, about = "OneUSG web time-clock automation")]
struct Args {
    /// Portal username (or ONECLOCK_USERNAME)
    #[arg(short, long)]
    username: Option<String>,

    /// Minutes to stay clocked in before clocking out
    #[arg(short, long)]
    minutes: f64,

    /// Run Chrome headless (recommended for CI / unattended runs)
    #[arg(long)]
    headless: bool,

    /// Verbose debug output
    #[arg(long)]
    debug: bool,

    /// Directory for failure artifacts (png/html/url)
    #[arg(long, env = "ONECLOCK_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Seconds to wait for Duo/SSO completion
    #[arg(long, env = "ONECLOCK_DUO_TIMEOUT", default_value_t = 120)]
    duo_timeout: u64,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Logs go to stderr; stdout is for operator progress lines.
    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let username = args
        .username
        .or_else(|| std::env::var("ONECLOCK_USERNAME").ok())
        .unwrap_or_default();
    if username.is_empty() {
        return Err("Set your username with -u or the ONECLOCK_USERNAME env var.".into());
    }

    let password = match std::env::var("ONECLOCK_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => {
            println!("Password: ");
            rpassword::read_password()?
        }
    };
    if password.is_empty() {
        return Err("Set your password with ONECLOCK_PASSWORD or at the prompt.".into());
    }

    let mut cfg = AuthConfig::new(username, password);
    cfg.mfa_timeout = Duration::from_secs(args.duo_timeout);
    cfg.dump_dir = args.dump_dir.clone();

    let passcode = passcode_source();
    let total_seconds = (args.minutes * 60.0).round().max(0.0) as u64;

    println!("\nClocking {} minutes...\n", args.minutes);
    debug!(
        headless = args.headless,
        duo_timeout = args.duo_timeout,
        dump_dir = ?args.dump_dir,
        "starting"
    );

    let headless = args.headless;
    let factory = || HeadlessDriver::launch(headless);
    let mut driver = match login_with_restart(factory, &cfg, &passcode).await {
        Ok(driver) => driver,
        Err(e) => {
            notify(
                "Clock manager error",
                "Login failed. Please check the terminal output and clock manually.",
                true,
            )
            .await;
            return Err(e.into());
        }
    };

    let outcome = schedule(&mut driver, &cfg, total_seconds).await;
    let _ = driver.quit().await;
    outcome
}

/// Clock in, hold the session for the requested time, clock out.
async fn schedule<D: Driver>(
    driver: &mut D,
    cfg: &AuthConfig,
    total_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if !clock::punch(driver, cfg, Punch::In).await {
        return Err("Clock in failed.".into());
    }
    clock::dismiss_double_clock(driver).await;

    if total_seconds == 0 {
        if !clock::punch(driver, cfg, Punch::Out).await {
            return Err("Clock out failed. Verify your timecard manually.".into());
        }
        return Ok(());
    }

    let refresh_interval = 15 * 60;
    let mut elapsed: u64 = 0;
    while elapsed < total_seconds {
        if elapsed == 0 || elapsed % refresh_interval == 0 {
            clock::prevent_timeout(driver, cfg).await;
        }

        let chunk = 60.min(total_seconds - elapsed);
        tokio::time::sleep(Duration::from_secs(chunk)).await;
        elapsed += chunk;

        let minutes_done = elapsed / 60;
        let minutes_left = (total_seconds - elapsed) as f64 / 60.0;
        println!("{minutes_done} minutes done, roughly {minutes_left:.1} minutes left to go.");
    }

    if !clock::punch(driver, cfg, Punch::Out).await {
        artifacts::dump(driver, cfg.dump_dir.as_deref(), "clock_out_failed").await;
        return Err("Clock out failed. Verify your timecard manually.".into());
    }
    clock::dismiss_double_clock(driver).await;
    Ok(())
}

/// Resolve where Duo passcodes come from, in preference order: otpauth URI,
/// raw HOTP secret, static code.
fn passcode_source() -> PasscodeSource {
    let counter_file = std::env::var("ONECLOCK_DUO_HOTP_COUNTER_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".oneclock_hotp_counter")
        });

    if let Ok(uri) = std::env::var("ONECLOCK_DUO_OTP_URI") {
        if !uri.is_empty() {
            return PasscodeSource::OtpUri { uri, counter_file };
        }
    }
    if let Ok(secret) = std::env::var("ONECLOCK_DUO_HOTP_SECRET") {
        if !secret.is_empty() {
            return PasscodeSource::HotpSecret {
                secret,
                counter_file,
            };
        }
    }
    // An empty static code means "no automated passcode"; the MFA loop then
    // waits for a manual approval instead.
    PasscodeSource::Static(std::env::var("ONECLOCK_DUO_PASSCODE").unwrap_or_default())
}
