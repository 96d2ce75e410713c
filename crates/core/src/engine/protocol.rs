//! UCI command encoding and engine output parsing

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::EngineError;

static UCI_MOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-h][1-8][a-h][1-8][qrbn]?$").expect("valid regex"));
static BEST_MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"bestmove\s+([a-h][1-8][a-h][1-8][qrbn]?)(?:\s+ponder\s+([a-h][1-8][a-h][1-8][qrbn]?))?")
        .expect("valid regex")
});

/// Search limits for `go`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoParams {
    Depth(u32),
    MoveTime(u64),
    Infinite,
}

/// Commands the bridge sends to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    Position { fen: String },
    Go(GoParams),
    SetOption { name: String, value: String },
    Stop,
    Quit,
}

impl UciCommand {
    /// Prefix of the correlation id given to this command
    pub fn id_prefix(&self) -> &'static str {
        match self {
            UciCommand::Uci => "uci",
            UciCommand::IsReady => "isready",
            UciCommand::UciNewGame => "ucinewgame",
            UciCommand::Position { .. } => "position",
            UciCommand::Go(_) => "go",
            UciCommand::SetOption { .. } => "setoption",
            UciCommand::Stop => "stop",
            UciCommand::Quit => "quit",
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => write!(f, "uci"),
            UciCommand::IsReady => write!(f, "isready"),
            UciCommand::UciNewGame => write!(f, "ucinewgame"),
            UciCommand::Position { fen } => write!(f, "position fen {}", fen),
            UciCommand::Go(GoParams::Depth(d)) => write!(f, "go depth {}", d),
            UciCommand::Go(GoParams::MoveTime(ms)) => write!(f, "go movetime {}", ms),
            UciCommand::Go(GoParams::Infinite) => write!(f, "go infinite"),
            UciCommand::SetOption { name, value } => write!(f, "setoption name {} value {}", name, value),
            UciCommand::Stop => write!(f, "stop"),
            UciCommand::Quit => write!(f, "quit"),
        }
    }
}

/// Raw engine score, side-to-move relative as the engine reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

/// Fields of one `info` line. Absent tokens stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

pub fn is_uci_move(token: &str) -> bool {
    UCI_MOVE_RE.is_match(token)
}

/// Token scan of an `info` line; None for any other line.
pub fn parse_info_line(line: &str) -> Option<InfoLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.first() != Some(&"info") {
        return None;
    }

    let mut info = InfoLine::default();
    let mut i = 1;
    while i < parts.len() {
        let next = parts.get(i + 1).copied();
        match parts[i] {
            "depth" => {
                info.depth = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "seldepth" => {
                info.seldepth = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "time" => {
                info.time_ms = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "nodes" => {
                info.nodes = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "nps" => {
                info.nps = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "hashfull" => {
                info.hashfull = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "multipv" => {
                info.multipv = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "score" => {
                let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                info.score = match (next, value) {
                    (Some("cp"), Some(cp)) => Some(Score::Cp(cp)),
                    (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                    _ => info.score,
                };
                i += 3;
            }
            "pv" => {
                i += 1;
                while i < parts.len() && is_uci_move(parts[i]) {
                    info.pv.push(parts[i].to_string());
                    i += 1;
                }
            }
            "string" => break,
            _ => i += 1,
        }
    }
    Some(info)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    pub mv: String,
    pub ponder: Option<String>,
}

/// Finds `bestmove` anywhere in a response transcript.
pub fn parse_best_move(text: &str) -> Result<BestMove, EngineError> {
    let caps = BEST_MOVE_RE
        .captures(text)
        .ok_or_else(|| EngineError::NoBestMove(text.lines().last().unwrap_or_default().to_string()))?;
    Ok(BestMove {
        mv: caps[1].to_string(),
        ponder: caps.get(2).map(|m| m.as_str().to_string()),
    })
}
