//! Interactive chat over the session engine

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::domain::{Plan, Session};
use crate::service::TripService;
use crate::session::TurnOutcome;

enum SlashResult {
    Continue,
    Quit,
}

/// Chat REPL bound to one session
pub struct ChatRepl {
    service: Arc<TripService>,
    session_id: Option<String>,
}

impl ChatRepl {
    pub fn new(service: Arc<TripService>, session_id: Option<String>) -> Self {
        Self { service, session_id }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.send(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }

        if let Some(id) = &self.session_id {
            println!("Session {} saved. Resume with {}", id.bright_white(), format!("tp chat --session {id}").yellow());
        }
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "TripPlanner".bright_cyan().bold());
        println!("Tell me where you want to go, e.g. \"From Istanbul to Berlin, 2025-11-20 to 2025-11-23, 2 adults\"");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn send(&mut self, input: &str) {
        debug!(session_id = ?self.session_id, "send: called");
        let progress = self.session_id.as_deref().and_then(|id| self.service.progress(id).ok());
        let printer = progress.map(|mut rx| {
            tokio::spawn(async move {
                while let Some(p) = rx.recv().await {
                    let detail = p.detail.map(|d| format!(" ({d})")).unwrap_or_default();
                    println!("  {} {}{}", "·".dimmed(), p.stage.as_str().dimmed(), detail.dimmed());
                }
            })
        });

        let result = match &self.session_id {
            Some(id) => self.service.continue_conversation(id, input).await,
            None => self.service.start_conversation(input).await,
        };
        if let Some(mut handle) = printer {
            // Let the last stages print before tearing the stream down
            let _ = tokio::time::timeout(Duration::from_millis(50), &mut handle).await;
            handle.abort();
        }

        match result {
            Ok(outcome) => {
                self.session_id = Some(outcome.session_id.clone());
                print_outcome(&outcome);
            }
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        }
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/help" | "/h" => {
                print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/plan" | "/slots" | "/session" => {
                let Some(id) = self.session_id.clone() else {
                    println!("{}", "No conversation yet.".dimmed());
                    return SlashResult::Continue;
                };
                match self.service.session(&id).await {
                    Ok(session) if cmd == "/plan" => match &session.current_plan {
                        Some(plan) => print_plan(plan),
                        None => println!("{}", "No itinerary yet.".dimmed()),
                    },
                    Ok(session) if cmd == "/slots" => print_slots(&session),
                    Ok(session) => println!("{} ({:?})", session.id.bright_white(), session.state()),
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }
}

fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan());
    println!("  {:10} Show this help", "/help".yellow());
    println!("  {:10} Show the current itinerary", "/plan".yellow());
    println!("  {:10} Show what I know about the trip", "/slots".yellow());
    println!("  {:10} Show the session id", "/session".yellow());
    println!("  {:10} Exit", "/quit".yellow());
    println!();
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("{} {}", "tp:".bright_blue().bold(), outcome.assistant_text);
    if outcome.complete
        && let Some(plan) = &outcome.plan
    {
        print_plan(plan);
    }
}

fn print_slots(session: &Session) {
    let slots = &session.collected_slots;
    let show = |v: Option<String>| v.unwrap_or_else(|| "-".dimmed().to_string());
    println!("  {:12} {}", "origin", show(slots.origin.clone()));
    println!("  {:12} {}", "destination", show(slots.destination.clone()));
    println!("  {:12} {}", "start date", show(slots.start_date.map(|d| d.to_string())));
    println!("  {:12} {}", "end date", show(slots.end_date.map(|d| d.to_string())));
    println!("  {:12} {}", "adults", show(slots.adults.map(|n| n.to_string())));
    println!("  {:12} {}", "children", show(slots.children.map(|n| n.to_string())));
    println!("  {:12} {}", "preferences", slots.preferences.join(", "));
    println!("  {:12} {}", "budget", show(slots.budget.clone()));
}

/// Human-readable itinerary
pub fn print_plan(plan: &Plan) {
    println!();
    println!(
        "{} {} → {} ({} to {}, {} days)",
        "Trip".bright_cyan().bold(),
        plan.origin,
        plan.destination.bold(),
        plan.start_date,
        plan.end_date,
        plan.total_days
    );
    if let Some(hotel) = &plan.lodging.selected {
        println!("  {} {} ({:.2} {})", "Stay:".bright_white(), hotel.name, hotel.price_total, plan.currency);
    }
    for day in 1..=plan.total_days {
        println!("  {}", format!("Day {day}").bright_white().bold());
        for slot in plan.slots_on_day(day) {
            let title = slot.chosen().map(|a| a.title.as_str()).unwrap_or("-");
            let extra = slot.options.len().saturating_sub(1);
            println!(
                "    {}-{}  {}  {}",
                slot.start_time,
                slot.end_time,
                title,
                format!("[{}] +{extra} alternatives", slot.id).dimmed()
            );
        }
    }
    println!(
        "  {} {:.2} {}",
        "Estimated total:".bright_white(),
        plan.pricing.total_estimated,
        plan.currency
    );
    for warning in &plan.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    println!();
}
