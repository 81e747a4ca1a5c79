//! `ispyctl devices`

use crate::display;
use crate::session::Session;
use anyhow::Result;

pub async fn run(session: &Session, json: bool) -> Result<()> {
    let devices = session.registry.devices().await;
    let selected = session.selected_device().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    display::print_devices(&devices, selected.as_ref().map(|d| d.id.as_str()));
    if let Some(device) = selected {
        println!();
        display::print_device_detail(&device);
    }
    Ok(())
}
