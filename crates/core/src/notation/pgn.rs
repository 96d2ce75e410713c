//! PGN generation and parsing

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use shakmaty::{fen::Fen, CastlingMode, Chess, Color, Position};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor};
use std::ops::ControlFlow;
use std::path::Path;
use thiserror::Error;

use crate::rules::{ChessMove, GameResult};

/// The seven-tag roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnHeaders {
    pub event: String,
    pub site: String,
    pub date: String,
    pub round: String,
    pub white: String,
    pub black: String,
}

impl Default for PgnHeaders {
    fn default() -> Self {
        Self {
            event: "?".into(),
            site: "?".into(),
            date: "????.??.??".into(),
            round: "?".into(),
            white: "?".into(),
            black: "?".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgnOptions {
    pub include_headers: bool,
    pub include_comments: bool,
    pub max_line_length: usize,
    pub headers: PgnHeaders,
    /// `None` writes `*`
    pub result: Option<GameResult>,
    pub custom_headers: Vec<(String, String)>,
    /// Comments keyed by ply index
    pub comments: BTreeMap<usize, Vec<String>>,
    /// Written as `SetUp`/`FEN` headers and used for move numbering
    pub starting_fen: Option<String>,
}

impl Default for PgnOptions {
    fn default() -> Self {
        Self {
            include_headers: true,
            include_comments: true,
            max_line_length: 80,
            headers: PgnHeaders::default(),
            result: None,
            custom_headers: Vec::new(),
            comments: BTreeMap::new(),
            starting_fen: None,
        }
    }
}

fn header_line(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{name} \"{escaped}\"]")
}

/// Side to move and fullmove number of a FEN, defaulting to 1. white
fn numbering_start(fen: Option<&str>) -> (Color, u32) {
    let Some(fen) = fen else {
        return (Color::White, 1);
    };
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let turn = match fields.get(1) {
        Some(&"b") => Color::Black,
        _ => Color::White,
    };
    let fullmove = fields
        .get(5)
        .and_then(|n| n.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1);
    (turn, fullmove)
}

/// Builds PGN text: headers, then wrapped movetext ending in the result token.
pub fn generate_pgn(moves: &[ChessMove], options: &PgnOptions) -> String {
    let result_token = options.result.map_or("*", |r| r.pgn_token());
    let mut out = String::new();

    if options.include_headers {
        let h = &options.headers;
        let mut lines = vec![
            header_line("Event", &h.event),
            header_line("Site", &h.site),
            header_line("Date", &h.date),
            header_line("Round", &h.round),
            header_line("White", &h.white),
            header_line("Black", &h.black),
            header_line("Result", result_token),
        ];
        if let Some(fen) = &options.starting_fen {
            lines.push(header_line("SetUp", "1"));
            lines.push(header_line("FEN", fen));
        }
        for (name, value) in &options.custom_headers {
            lines.push(header_line(name, value));
        }
        out.push_str(&lines.join("\n"));
        out.push_str("\n\n");
    }

    let (mut turn, mut number) = numbering_start(options.starting_fen.as_deref());
    let mut tokens: Vec<String> = Vec::with_capacity(moves.len() * 2 + 1);
    for (ply, mv) in moves.iter().enumerate() {
        match turn {
            Color::White => tokens.push(format!("{number}.")),
            Color::Black if ply == 0 => tokens.push(format!("{number}...")),
            Color::Black => {}
        }
        tokens.push(mv.san.clone());

        if options.include_comments {
            if let Some(comments) = options.comments.get(&ply) {
                for comment in comments {
                    tokens.push(format!("{{{}}}", comment.replace('}', ")")));
                }
            }
        }

        if turn == Color::Black {
            number += 1;
        }
        turn = turn.other();
    }
    tokens.push(result_token.to_string());

    out.push_str(&wrap_tokens(&tokens, options.max_line_length));
    out
}

/// Greedy line filling; a token longer than the limit gets a line of its own.
fn wrap_tokens(tokens: &[String], max_line_length: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for token in tokens {
        if !current.is_empty() && current.len() + 1 + token.len() > max_line_length {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(token);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Represents a parsed chess game
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub starting_fen: Option<String>,
    /// Every tag in file order
    pub tags: Vec<(String, String)>,
    pub moves: Vec<String>,
    pub final_position: Chess,
}

impl PgnGame {
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn summary(&self) -> String {
        let white = self.white.as_deref().unwrap_or("Unknown");
        let black = self.black.as_deref().unwrap_or("Unknown");
        let result = self.result.as_deref().unwrap_or("*");
        format!("{} vs {} - {}", white, black, result)
    }
}

#[derive(Default)]
struct GameTags {
    event: Option<String>,
    site: Option<String>,
    date: Option<String>,
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
    fen: Option<String>,
    all: Vec<(String, String)>,
}

struct GameMoves {
    tags: GameTags,
    moves: Vec<String>,
    current_position: Chess,
    success: bool,
}

struct GameParser;

impl Visitor for GameParser {
    type Tags = GameTags;
    type Movetext = GameMoves;
    type Output = Option<PgnGame>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name_str = String::from_utf8_lossy(name).to_string();
        let value_str = value.decode_utf8_lossy().to_string();

        match name_str.as_str() {
            "Event" => tags.event = Some(value_str.clone()),
            "Site" => tags.site = Some(value_str.clone()),
            "Date" => tags.date = Some(value_str.clone()),
            "White" => tags.white = Some(value_str.clone()),
            "Black" => tags.black = Some(value_str.clone()),
            "Result" => tags.result = Some(value_str.clone()),
            "FEN" => tags.fen = Some(value_str.clone()),
            _ => {}
        }
        tags.all.push((name_str, value_str));

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let start = match &tags.fen {
            Some(fen) => Fen::from_ascii(fen.as_bytes())
                .ok()
                .and_then(|f| f.into_position::<Chess>(CastlingMode::Standard).ok()),
            None => Some(Chess::default()),
        };

        ControlFlow::Continue(GameMoves {
            tags,
            moves: Vec::new(),
            success: start.is_some(),
            current_position: start.unwrap_or_default(),
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if !movetext.success {
            return ControlFlow::Continue(());
        }

        movetext.moves.push(san.san.to_string());

        match san.san.to_move(&movetext.current_position) {
            Ok(m) => match movetext.current_position.clone().play(m) {
                Ok(new_pos) => {
                    movetext.current_position = new_pos;
                }
                Err(_) => {
                    movetext.success = false;
                }
            },
            Err(_) => {
                movetext.success = false;
            }
        }

        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        if movetext.success {
            Some(PgnGame {
                event: movetext.tags.event,
                site: movetext.tags.site,
                date: movetext.tags.date,
                white: movetext.tags.white,
                black: movetext.tags.black,
                result: movetext.tags.result,
                starting_fen: movetext.tags.fen,
                tags: movetext.tags.all,
                moves: movetext.moves,
                final_position: movetext.current_position,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum PgnError {
    #[error("File error: {0}")]
    FileError(#[from] io::Error),
    #[error("No valid games found in PGN")]
    NoGamesFound,
    #[error("Parse error: {0}")]
    ParseError(String),
}

pub fn parse_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<PgnGame>, PgnError> {
    let contents = fs::read_to_string(path)?;
    parse_pgn_string(&contents)
}

pub fn parse_pgn_string(pgn: &str) -> Result<Vec<PgnGame>, PgnError> {
    let mut parser = GameParser;
    let mut games: Vec<PgnGame> = Vec::new();

    let cursor = Cursor::new(pgn.as_bytes());
    let mut reader = pgn_reader::Reader::new(cursor);

    loop {
        match reader.read_game(&mut parser) {
            Ok(Some(maybe_game)) => {
                if let Some(game) = maybe_game {
                    games.push(game);
                }
            }
            Ok(None) => break,
            Err(e) => return Err(PgnError::ParseError(e.to_string())),
        }
    }

    if games.is_empty() {
        Err(PgnError::NoGamesFound)
    } else {
        Ok(games)
    }
}

/// SAN tokens of the first game in `pgn`
pub fn get_moves_from_pgn(pgn: &str) -> Result<Vec<String>, PgnError> {
    let mut games = parse_pgn_string(pgn)?;
    Ok(games.remove(0).moves)
}
