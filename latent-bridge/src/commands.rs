use latent_core::scheduler::Event;
use latent_core::{ControlId, LATENT_DIM};

/// A line typed at the explorer prompt.
#[derive(Debug, PartialEq)]
pub enum Command {
    Event(Event),
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
a <i> <v>   set slider i of A (0-9)
b <i> <v>   set slider i of B
mix <v>     set the mix slider
start | stop | toggle
step        one training step
load        load pretrained weights
reset       reset model weights
show        re-render without changes
status      print scheduler state
quit";

pub struct CommandParser;

impl CommandParser {
    pub fn parse(input: &str) -> Command {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(cmd) = parts.first() else {
            return Command::Unknown(String::new());
        };

        let event = match (cmd.to_lowercase().as_str(), &parts[1..]) {
            ("a" | "b", [index, value]) => {
                match (index.parse::<usize>(), value.parse::<f64>()) {
                    (Ok(i), Ok(v)) if i < LATENT_DIM && v.is_finite() => {
                        let control = if cmd.eq_ignore_ascii_case("a") {
                            ControlId::A(i)
                        } else {
                            ControlId::B(i)
                        };
                        Event::ControlChanged { control, value: v }
                    }
                    _ => return Command::Unknown(input.trim().to_string()),
                }
            }
            ("mix" | "t", [value]) => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => Event::ControlChanged {
                    control: ControlId::Mix,
                    value: v,
                },
                _ => return Command::Unknown(input.trim().to_string()),
            },
            ("start" | "train", []) => Event::Start,
            ("stop" | "pause", []) => Event::Stop,
            ("toggle", []) => Event::Toggle,
            ("step", []) => Event::Step,
            ("load", []) => Event::LoadPretrained,
            ("reset", []) => Event::ResetWeights,
            ("show" | "refresh", []) => Event::Refresh,
            ("status", []) => return Command::Status,
            ("help" | "?", []) => return Command::Help,
            ("quit" | "exit" | "q", []) => return Command::Quit,
            _ => return Command::Unknown(input.trim().to_string()),
        };
        Command::Event(event)
    }
}
