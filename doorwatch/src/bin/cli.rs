//! Command-line interface for doorwatch.
//!
//! Queries the daemon's HTTP API and can inject door events by hand,
//! which is handy when testing a new sensor.

use std::env;
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;

use doorwatch::api_client::{self, types::SensorView};
use doorwatch::config::format_hms;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
    }

    let command = &args[1];
    let sensor_id = args.get(2).map(String::as_str);

    match (command.as_str(), sensor_id) {
        ("status", None) => cmd_status().await?,
        ("status", Some(id)) => cmd_sensor(id).await?,
        ("open", Some(id)) => print_sensor(&make_client().door_opened(id).await?),
        ("close", Some(id)) => print_sensor(&make_client().door_closed(id).await?),
        ("open" | "close", None) => {
            eprintln!("{command} needs a sensor id");
            std::process::exit(1);
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage: doorwatch-cli <command> [sensor]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status [sensor]  Show all sensors, or one");
    eprintln!("  open <sensor>    Report a door as opened");
    eprintln!("  close <sensor>   Report a door as closed");
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  DOORWATCH_API_URL    API base URL (default: {})",
        api_client::DEFAULT_API_URL
    );
    std::process::exit(1);
}

/// Build an API client, honoring DOORWATCH_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("DOORWATCH_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

async fn cmd_status() -> Result<()> {
    let sensors = make_client().sensors().await?;
    if sensors.is_empty() {
        println!("Sensors: (none)");
    }
    for sensor in &sensors {
        print_sensor(sensor);
    }
    Ok(())
}

async fn cmd_sensor(id: &str) -> Result<()> {
    match make_client().sensor(id).await? {
        Some(sensor) => print_sensor(&sensor),
        None => {
            eprintln!("No such sensor: {id}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn print_sensor(sensor: &SensorView) {
    let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    let age = Duration::from_millis(now_ms.saturating_sub(sensor.last_updated_ms).max(0) as u64);

    print!(
        "{:<16} {:<6} for {}",
        sensor.id,
        sensor.state.to_string(),
        format_hms(age)
    );
    match &sensor.alarm {
        None => println!(),
        Some(alarm) => match alarm.fires_in_secs {
            Some(secs) => println!(
                "  alarm {} (fires in {})",
                alarm.phase,
                format_hms(Duration::from_secs(secs))
            ),
            None => println!("  alarm {}", alarm.phase),
        },
    }
}
