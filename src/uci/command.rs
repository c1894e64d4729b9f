//! UCI command parsing.

use crate::search::time::SearchLimits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// Raw tokens after `position`.
    Position(Vec<String>),
    /// Raw tokens after `go`.
    Go(Vec<String>),
    SetOption { name: String, value: String },
    Stop,
    Bench,
    Quit,
    /// Unknown input is ignored by the loop.
    Unknown(String),
}

#[must_use]
pub fn parse_command(line: &str) -> UciCommand {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return UciCommand::Unknown(String::new());
    };
    match head {
        "uci" => UciCommand::Uci,
        "isready" => UciCommand::IsReady,
        "ucinewgame" => UciCommand::UciNewGame,
        "position" => UciCommand::Position(parts.map(str::to_string).collect()),
        "go" => UciCommand::Go(parts.map(str::to_string).collect()),
        "setoption" => parse_setoption(&parts.collect::<Vec<_>>()),
        "stop" => UciCommand::Stop,
        "bench" => UciCommand::Bench,
        "quit" => UciCommand::Quit,
        other => UciCommand::Unknown(other.to_string()),
    }
}

/// `setoption name <name...> value <value...>`.
fn parse_setoption(parts: &[&str]) -> UciCommand {
    let mut name = Vec::new();
    let mut value = Vec::new();
    let mut target: Option<&mut Vec<&str>> = None;
    for &token in parts {
        match token {
            "name" => target = Some(&mut name),
            "value" => target = Some(&mut value),
            _ => {
                if let Some(list) = target.as_mut() {
                    list.push(token);
                }
            }
        }
    }
    UciCommand::SetOption {
        name: name.join(" "),
        value: value.join(" "),
    }
}

/// Parsed `go` arguments: the limits plus the perft escape hatch.
#[derive(Debug, Default, Clone)]
pub struct GoParams {
    pub limits: SearchLimits,
    pub perft: Option<usize>,
}

#[must_use]
pub fn parse_go_params(tokens: &[String]) -> GoParams {
    let mut params = GoParams::default();
    let mut i = 0;
    while i < tokens.len() {
        let consumed = match tokens[i].as_str() {
            "wtime" => set(&mut params.limits.wtime, tokens.get(i + 1)),
            "btime" => set(&mut params.limits.btime, tokens.get(i + 1)),
            "winc" => set(&mut params.limits.winc, tokens.get(i + 1)),
            "binc" => set(&mut params.limits.binc, tokens.get(i + 1)),
            "movestogo" => set(&mut params.limits.movestogo, tokens.get(i + 1)),
            "movetime" => set(&mut params.limits.movetime, tokens.get(i + 1)),
            "nodes" => set(&mut params.limits.nodes, tokens.get(i + 1)),
            "depth" => set(&mut params.limits.depth, tokens.get(i + 1)),
            "perft" => set(&mut params.perft, tokens.get(i + 1)),
            "infinite" => {
                params.limits.infinite = true;
                1
            }
            // Unknown token: skip it and keep parsing.
            _ => 1,
        };
        i += consumed;
    }
    params
}

fn set<T: std::str::FromStr>(slot: &mut Option<T>, token: Option<&String>) -> usize {
    if let Some(value) = token.and_then(|t| t.parse().ok()) {
        *slot = Some(value);
        2
    } else {
        1
    }
}
