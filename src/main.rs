use compucolor::config::{Config, Pacing};
use compucolor::io::TypingMode;
use compucolor::video::TextScreen;
use compucolor::{Machine, Runner};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Largest ROM image accepted (the whole address space).
const MAX_ROM_SIZE: u64 = 0x10000;
/// Largest disk image accepted. A raw-track image is about 160 KB of text.
const MAX_DISK_SIZE: u64 = 4 * 1024 * 1024;
/// Largest text file accepted for autotyping.
const MAX_TYPE_SIZE: u64 = 1024 * 1024;

const USAGE: &str = "usage: compucolor <rom> [--disk0 F] [--disk1 F] [--config F] \
[--seconds N] [--unthrottled] [--save0 F] [--save1 F] [--four-phase] [--type F] [--type-keys]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    rom: Option<PathBuf>,
    disks: [Option<PathBuf>; 2],
    saves: [Option<PathBuf>; 2],
    config: Option<PathBuf>,
    autotype: Option<PathBuf>,
    type_keys: bool,
    seconds: Option<f64>,
    unthrottled: bool,
    four_phase: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--disk0" => parsed.disks[0] = Some(value(&arg)?.into()),
            "--disk1" => parsed.disks[1] = Some(value(&arg)?.into()),
            "--save0" => parsed.saves[0] = Some(value(&arg)?.into()),
            "--save1" => parsed.saves[1] = Some(value(&arg)?.into()),
            "--config" => parsed.config = Some(value(&arg)?.into()),
            "--type" => parsed.autotype = Some(value(&arg)?.into()),
            "--type-keys" => parsed.type_keys = true,
            "--seconds" => {
                let text = value(&arg)?;
                let seconds: f64 = text
                    .parse()
                    .map_err(|_| format!("--seconds: not a number: {}", text))?;
                if !(seconds.is_finite() && seconds >= 0.0) {
                    return Err(format!("--seconds: out of range: {}", text));
                }
                parsed.seconds = Some(seconds);
            }
            "--unthrottled" => parsed.unthrottled = true,
            "--four-phase" => parsed.four_phase = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ if parsed.rom.is_none() => parsed.rom = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument {}", arg)),
        }
    }
    Ok(parsed)
}

/// Read a whole file, refusing anything over `max` bytes.
fn read_capped(path: &Path, max: u64, what: &str) -> Result<Vec<u8>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to read {} {}: {}", what, path.display(), e))?;

    if let Ok(metadata) = file.metadata() {
        if metadata.len() > max {
            return Err(format!(
                "{} {} too large: {} bytes (max {} bytes)",
                what,
                path.display(),
                metadata.len(),
                max
            ));
        }
    }

    let mut buffer = Vec::new();
    file.take(max + 1)
        .read_to_end(&mut buffer)
        .map_err(|e| format!("Failed to read {} {}: {}", what, path.display(), e))?;
    if buffer.len() as u64 > max {
        return Err(format!("{} {} too large: exceeds {} bytes", what, path.display(), max));
    }
    Ok(buffer)
}

fn load_disk(machine: &mut Machine, unit: usize, path: &Path) -> Result<(), String> {
    let bytes = read_capped(path, MAX_DISK_SIZE, "disk image")?;
    let text = String::from_utf8(bytes)
        .map_err(|e| format!("Disk image {} is not valid UTF-8: {}", path.display(), e))?;
    machine
        .insert_disk_text(unit, &text)
        .map_err(|e| format!("Failed to load disk image {}: {}", path.display(), e))?;
    log::info!(
        "CD{}: {} ({})",
        unit,
        path.display(),
        machine.volume_label(unit).unwrap_or_default()
    );
    Ok(())
}

fn save_disk(machine: &mut Machine, unit: usize, path: &Path) -> Result<(), String> {
    let text = machine
        .save_disk(unit)
        .ok_or_else(|| format!("CD{}: no disk to save", unit))?;
    std::fs::write(path, text).map_err(|e| format!("Failed to write disk image {}: {}", path.display(), e))?;
    log::info!("CD{}: saved to {}", unit, path.display());
    Ok(())
}

fn start_autotype(machine: &mut Machine, path: &Path) -> Result<(), String> {
    let bytes = read_capped(path, MAX_TYPE_SIZE, "text file")?;
    let text = String::from_utf8_lossy(&bytes);
    machine
        .autotype(&text)
        .map_err(|e| format!("Cannot type {}: {}", path.display(), e))
}

fn build_config(args: &Args) -> Result<Config, String> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => Config::default(),
    };
    if args.rom.is_some() {
        config.rom = args.rom.clone();
    }
    for (slot, disk) in config.disks.iter_mut().zip(&args.disks) {
        if disk.is_some() {
            *slot = disk.clone();
        }
    }
    if args.unthrottled {
        config.pacing = Pacing::Unthrottled;
    }
    if args.four_phase {
        config.stepper_phases = 4;
    }
    if args.type_keys {
        config.autotype = TypingMode::Keys;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn run(args: Args) -> Result<(), String> {
    let config = build_config(&args)?;
    let rom_path = config.rom.clone().ok_or_else(|| USAGE.to_string())?;

    let mut machine = Machine::new(&config);
    let rom = read_capped(&rom_path, MAX_ROM_SIZE, "ROM")?;
    machine.load_rom(&rom);
    for (unit, disk) in config.disks.iter().enumerate() {
        if let Some(path) = disk {
            load_disk(&mut machine, unit, path)?;
        }
    }
    machine.hard_reset();
    if let Some(path) = &args.autotype {
        start_autotype(&mut machine, path)?;
    }

    let mut runner = Runner::new(&config);
    let start = Instant::now();
    match args.seconds {
        Some(seconds) => {
            runner.run_for(&mut machine, Duration::from_secs_f64(seconds));
        }
        None => loop {
            runner.run_slice(&mut machine);
            let output = machine.serial_output();
            if !output.is_empty() {
                print!("{}", String::from_utf8_lossy(&output));
            }
        },
    }
    log::info!(
        "ran {} ticks in {:.2?}, busy {:.0}%",
        machine.now(),
        start.elapsed(),
        runner.busy_fraction() * 100.0
    );
    if let Some(fault) = machine.fault() {
        log::warn!("emulation faulted: {}", fault);
    }

    let output = machine.serial_output();
    if !output.is_empty() {
        println!("J-2: {}", String::from_utf8_lossy(&output));
    }

    let mut screen = TextScreen::new();
    machine.render(&mut screen);
    for line in screen.lines() {
        println!("{}", line);
    }

    for (unit, save) in args.saves.iter().enumerate() {
        if let Some(path) = save {
            save_disk(&mut machine, unit, path)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = parse_args(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
