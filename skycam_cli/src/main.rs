mod capture;
mod cli;
mod fits;
mod logging;
mod output;
mod serial;

use clap::Parser;
use simple_eyre::Result;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use allsky340::{CancelToken, Crop, ExposureSpec, FrameType};
use capture::CaptureLoop;
use cli::*;
use output::Observation;
use serial::SerialConf;

fn main() -> Result<()> {
    simple_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    match &cli.command {
        Commands::List => list_serial(),
        Commands::Ping(conf) => ping(conf),
        Commands::Firmware(conf) => get_firmware(conf),
        Commands::Shutter(subcomm) => match &subcomm.command {
            ShutterCommands::Open(conf) => Ok(conf.open_camera()?.open_shutter()?),
            ShutterCommands::Close(conf) => Ok(conf.open_camera()?.close_shutter()?),
            ShutterCommands::Off(conf) => Ok(conf.open_camera()?.de_energize_shutter()?),
        },
        Commands::Abort(conf) => Ok(conf.open_camera()?.abort_exposure()?),
        Commands::Heater(conf) => Ok(conf.serial.open_camera()?.set_heater(conf.state.is_on())?),
        Commands::Chop(conf) => Ok(conf
            .serial
            .open_camera()?
            .set_shutter_chop(conf.state.is_on())?),
        Commands::BaudRate(conf) => set_baud_rate(conf),
        Commands::Expose(conf) => expose(conf),
        Commands::Capture(conf) => {
            let camera = conf.serial.open_camera()?;
            CaptureLoop::new(camera, conf).run(&conf.dir)
        }
    }
}

/// Returns std::io::Write stream with coloring enabled if program is run interactively
fn get_stdout() -> StandardStream {
    StandardStream::stdout(if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

fn print_status(ok: bool, msg: &str) -> Result<()> {
    let mut stdout = get_stdout();
    let color = if ok { Color::Green } else { Color::Red };
    stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(&mut stdout, "{}", msg)?;
    stdout.reset()?;
    Ok(())
}

fn list_serial() -> Result<()> {
    let paths = serialport::available_ports()?;
    if paths.is_empty() {
        print_status(false, "No connected serial ports found.")?;
    } else {
        print_status(true, "Connected serial ports:")?;
    }
    paths.iter().for_each(|p| println!("{}", p.port_name));

    Ok(())
}

fn ping(conf: &SerialConf) -> Result<()> {
    let mut camera = conf.open_camera()?;
    if camera.ping()? {
        print_status(true, "Camera on-line and communicating properly.")
    } else {
        print_status(false, "Did not receive correct response from camera.")
    }
}

fn get_firmware(conf: &SerialConf) -> Result<()> {
    let mut camera = conf.open_camera()?;
    println!("Camera firmware: {}", camera.firmware()?);
    Ok(())
}

fn set_baud_rate(conf: &SetBaudRateConf) -> Result<()> {
    let mut camera = conf.serial.open_camera()?;
    camera.set_baud_rate(conf.rate)?;
    print_status(true, &format!("Camera now communicating at {} baud.", conf.rate))
}

fn expose(conf: &ExposeConf) -> Result<()> {
    let frame = if conf.light {
        FrameType::Light
    } else {
        FrameType::Dark
    };
    let crop = if conf.cropped { Crop::Cropped } else { Crop::Full };
    let spec = ExposureSpec::new(conf.seconds, frame, crop)?;

    let mut camera = conf.serial.open_camera()?;
    let image = camera.capture(&spec, &CancelToken::new())?;
    if !image.substituted_blocks().is_empty() {
        let msg = format!(
            "Blocks {:?} could not be read and are zero-filled.",
            image.substituted_blocks()
        );
        print_status(false, &msg)?;
    }
    let obs = Observation {
        exposure: spec.seconds(),
        frame,
        taken_at: time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc()),
    };
    conf.output.write_image(&image, &obs)
}
