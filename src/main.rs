use anyhow::Result;

use newtab_core::{LocationSource, RefreshOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    newtab_core::init()?;

    let app = newtab_core::App::new()?;
    let report = app.start().await;

    tracing::info!("Newtab started");

    println!("Newtab - personalized new tab");
    println!("\nConfiguration:");
    println!("  Config directory: {}", app.config().config_dir.display());
    println!("  State database:   {}", app.config().storage.state_path.display());

    let location = match &report.location_source {
        LocationSource::Provider => "detected".to_string(),
        LocationSource::Saved => "saved".to_string(),
        LocationSource::Fallback(reason) => format!("fallback ({})", reason),
    };
    println!(
        "\nLocation: {:.4}, {:.4} [{}]",
        report.coordinates.latitude, report.coordinates.longitude, location
    );

    match &report.weather {
        RefreshOutcome::Updated(weather) => println!(
            "Weather:  {} {:.1}°C, {} ({})",
            weather.category().description(),
            weather.temperature,
            weather.description,
            weather.location.display_name
        ),
        RefreshOutcome::Failed(e) => println!("Weather:  unavailable ({})", e),
        RefreshOutcome::SkippedNoLocation => println!("Weather:  no location"),
        RefreshOutcome::InvalidLocation => println!("Weather:  invalid location"),
    }

    let state = app.store().snapshot();
    let open_tasks = state.tasks.iter().filter(|t| !t.completed).count();
    println!("Tasks:    {} open of {}", open_tasks, state.tasks.len());
    println!("Feed:     {} items", state.feed_items.len());

    app.shutdown()?;

    Ok(())
}
