//! Line-oriented driver for the selection state machine.
//! Useful for checking the transition table without a window or a camera.

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rollcall_core::roster::{DEFAULT_NAMES, DEFAULT_RADIUS};
use rollcall_core::{
    GestureSymbol, Phase, RandomPicker, Roster, SelectionEvent, SelectionMachine,
    DEFAULT_REVEAL_DELAY,
};

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║          Roll Call — Selection Machine Menu          ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let roster = match Roster::on_sphere(&DEFAULT_NAMES[..], DEFAULT_RADIUS, &mut rand::thread_rng()) {
        Ok(r)  => Arc::new(r),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("  {} students on the roster.", roster.len());
    println!();

    let mut sm = SelectionMachine::new(
        roster,
        RandomPicker::from_entropy(),
        DEFAULT_REVEAL_DELAY,
        Instant::now(),
    );

    print_menu();
    loop {
        let line = read_line(&format!("  [{}] > ", sm.phase()));
        if line.is_empty() {
            break; // stdin closed
        }
        let now = Instant::now();
        let event = match line.trim() {
            "t" => SelectionEvent::ManualTrigger,
            "p" => SelectionEvent::Gesture(GestureSymbol::OpenPalm),
            "f" => SelectionEvent::Gesture(GestureSymbol::ClosedFist),
            "v" => SelectionEvent::Gesture(GestureSymbol::Victory),
            "n" => SelectionEvent::Gesture(GestureSymbol::NoPose),
            "r" => SelectionEvent::Reset,
            "w" => {
                wait_for_reveal(&mut sm);
                continue;
            }
            "s" => {
                print_snapshot(&sm);
                continue;
            }
            "q" => {
                println!("\n  Goodbye!\n");
                break;
            }
            _ => {
                print_menu();
                continue;
            }
        };

        // The reveal may already be due if the user idled at the prompt.
        sm.tick(now);
        if sm.dispatch(event, now) {
            println!("  → {}", sm.phase());
        } else {
            println!("  (no-op in {})", sm.phase());
        }
    }
}

fn wait_for_reveal(sm: &mut SelectionMachine<RandomPicker>) {
    match sm.reveal_remaining(Instant::now()) {
        Some(left) => {
            println!("  decelerating for {} ms…", left.as_millis());
            thread::sleep(left);
            sm.tick(Instant::now());
            print_snapshot(sm);
        }
        None => println!("  nothing to wait for in {}", sm.phase()),
    }
}

fn print_snapshot(sm: &SelectionMachine<RandomPicker>) {
    let snap = sm.snapshot(Instant::now());
    println!("  ┌─ phase   : {}", snap.phase);
    println!("  │  gesture : {}", snap.gesture);
    println!("  │  elapsed : {} ms", snap.phase_elapsed.as_millis());
    if snap.phase == Phase::Selected {
        println!(
            "  │  winner  : #{} {}",
            snap.winner.map(|w| w.to_string()).unwrap_or_default(),
            snap.winner_name.unwrap_or_default()
        );
    }
    println!("  └─");
}

fn print_menu() {
    println!("  ┌──────────────────────────────────────────────────────┐");
    println!("  │  t  manual trigger      p  open palm                 │");
    println!("  │  f  closed fist         v  victory                   │");
    println!("  │  n  no pose             w  wait out the reveal       │");
    println!("  │  r  reset               s  snapshot      q  quit     │");
    println!("  └──────────────────────────────────────────────────────┘");
    println!();
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
