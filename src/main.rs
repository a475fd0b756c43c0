use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use chronav::model::{JumpReason, Record};
use chronav::parser::{self, Command};
use chronav::storage::SegmentStore;
use chronav::{Navigator, NavigatorConfig};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Jump between recorded time intervals", long_about = None)]
struct Args {
    /// Segment file backing the store.
    #[clap(long, default_value = "chronav_store.dat")]
    store: PathBuf,

    /// fsync after every append.
    #[clap(long)]
    strict: bool,

    /// Print jumped records as JSON.
    #[clap(long)]
    json: bool,

    /// Seconds in one day step.
    #[clap(long, default_value = "86400")]
    day_seconds: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("info,chronav=info"));
    tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_level(true)
    .init();

    let args = Args::parse();

    let store = match SegmentStore::open(&args.store, args.strict) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("[\u{2717}] Could not open store at {}: {}", args.store.display(), e);
            std::process::exit(1);
        }
    };
    let mut nav = Navigator::new(store, NavigatorConfig { day_seconds: args.day_seconds });

    print_banner();
    println!("Store: {} ({} records)", args.store.display(), nav.store().len());
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("chronav> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = execute_command(&mut nav, cmd, args.json) {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("ADD") || buffer.to_uppercase().starts_with("STORE") {
                    println!("    \u{2139}\u{fe0f}  Hint: Try 'ADD 1700000000 1700003600 \"payload\"' or use ONGOING as the end");
                }
            }
        }
    }
    println!("Bye.");
}

fn print_banner() {
    println!("\n==================================================");
    println!("   chronav - nearest-record time navigation");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. NEXT:   NEXT [AFTER <ts>]        jump to the next record");
    println!("2. PREV:   PREV [BEFORE <ts>]       jump to the previous record");
    println!("3. DAY:    DAY+ | DAY-              step one day forward / back");
    println!("   Bare NEXT/PREV re-ask from the reference time and land on the same");
    println!("   record while it covers that time; use DAY+/DAY- or give a time to move.");
    println!("4. ADD:    ADD <start> <end|ONGOING> \"payload\"   add to the working set");
    println!("5. STORE:  STORE <start> <end|ONGOING> \"payload\" append to the store");
    println!("6. SHOW:   working set and cursor");
    println!("7. RESET:  drop the jump anchor");
    println!("8. EXIT:   Quit\n");
}

fn execute_command(nav: &mut Navigator<SegmentStore>, cmd: Command, json: bool) -> Result<(), String> {
    let report = |record: &Record, reason: JumpReason| print_jump(record, reason, json);

    let jumped = match cmd {
        Command::Help => { print_help(); return Ok(()) },
        Command::Next { after } => {
            let since = after.or_else(|| nav.cursor().reference_time()).unwrap_or(0);
            nav.jump_next(since, report)
        }
        Command::Prev { before } => {
            let until = before.or_else(|| nav.cursor().reference_time()).unwrap_or(u64::MAX);
            nav.jump_prev(until, report)
        }
        Command::DayForward => nav.step_day_forward(report),
        Command::DayBackward => nav.step_day_backward(report),
        Command::Add { start, end, payload } => {
            let record = Record::unsaved(start, end, payload.into_bytes()).map_err(|e| e.to_string())?;
            if nav.groups().overlaps(&record) {
                return Err(format!("{} overlaps the working set", record.short()));
            }
            nav.add_record(record.clone());
            if nav.current_record().is_none() {
                nav.set_current(record);
            }
            println!("[\u{2713} OK] Added to working set ({} records)", nav.groups().record_count());
            return Ok(());
        }
        Command::Store { start, end, payload } => {
            let id = Uuid::new_v4();
            let record = Record::new(id, start, end, payload.into_bytes()).map_err(|e| e.to_string())?;
            nav.store_mut().append(&record).map_err(|e| e.to_string())?;
            println!("[\u{2713} OK] Stored ID: {}", id);
            return Ok(());
        }
        Command::Show => { print_state(nav); return Ok(()) },
        Command::Reset => {
            nav.reset();
            println!("[\u{2713} OK] Jump anchor cleared.");
            return Ok(());
        }
        Command::Exit => return Ok(()),
    };

    match jumped.map_err(|e| e.to_string())? {
        Some(_) => {}
        None => println!("[\u{2717}] Nothing there."),
    }
    if let Some(reference) = nav.cursor().reference_time() {
        println!("    reference: {}", reference);
    }
    Ok(())
}

fn print_jump(record: &Record, reason: JumpReason, json: bool) {
    if json {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(e) => println!("[\u{26a0}\u{fe0f} Error] {}", e),
        }
    } else {
        println!("[{}] {}", reason, record.short());
    }
}

fn print_state(nav: &Navigator<SegmentStore>) {
    println!("Working set: {} groups, {} records", nav.groups().len(), nav.groups().record_count());
    for (i, group) in nav.groups().groups().iter().enumerate() {
        println!("  grp {}: {}", i, group);
        for record in group.records() {
            println!("    • {}", record.short());
        }
    }
    match nav.current_record() {
        Some(current) => println!("Current: {}", current.short()),
        None => println!("Current: -"),
    }
    let anchor = if nav.cursor().is_anchored() { "anchored" } else { "unanchored" };
    match nav.cursor().reference_time() {
        Some(t) => println!("Reference: {} ({})", t, anchor),
        None => println!("Reference: - ({})", anchor),
    }
}
