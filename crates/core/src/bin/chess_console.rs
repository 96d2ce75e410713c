//! Console driver for the orchestrator

use std::env;
use std::process;

use chess_orchestrator_core::engine::protocol::is_uci_move;
use chess_orchestrator_core::{MoveRequest, Orchestrator, OrchestratorConfig, Result, RulesOracle};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "play" => play(&args[2..]).await,
        "analyze" => match args.get(2) {
            Some(fen) => analyze(fen).await,
            None => {
                println!("Error: Please provide a FEN string");
                println!("Usage: {} analyze \"<fen>\"", args[0]);
                process::exit(1);
            }
        },
        "pgn" => match args.get(2) {
            Some(path) => pgn(path).await,
            None => {
                println!("Error: Please provide a PGN file");
                println!("Usage: {} pgn <file>", args[0]);
                process::exit(1);
            }
        },
        _ => {
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [arguments]", program);
    println!();
    println!("Commands:");
    println!("  play <move>...       Play moves in SAN or UCI from the start position");
    println!("  analyze \"<fen>\"      Endgame and engine analysis of a position");
    println!("  pgn <file>           Load the first game of a PGN file");
    println!();
    println!("Examples:");
    println!("  {} play e4 e5 Nf3", program);
    println!("  {} play e2e4 e7e5", program);
    println!("  {} analyze \"8/8/8/4k3/8/8/8/4KQ2 w - - 0 1\"", program);
    println!();
    println!("Set CHESS_ENABLE_AI=true and CHESS_ENGINE_PATH to use Stockfish.");
}

async fn start() -> Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::from_env())?;
    orchestrator.initialize().await?;
    Ok(orchestrator)
}

/// UCI tokens pass through, anything else is read as SAN in `fen`
fn to_request(fen: &str, token: &str) -> Option<MoveRequest> {
    if is_uci_move(token) {
        return MoveRequest::from_uci(token);
    }
    let mut oracle = RulesOracle::from_fen(fen).ok()?;
    let outcome = oracle.make_san_move(token).ok()?;
    let mut request = MoveRequest::new(outcome.mv.from.to_string(), outcome.mv.to.to_string());
    if let Some(role) = outcome.mv.promotion {
        request = request.with_promotion(role.char().to_string());
    }
    Some(request)
}

async fn play(moves: &[String]) -> Result<()> {
    let mut orchestrator = start().await?;

    for token in moves {
        let fen = orchestrator.get_game_state()?.fen;
        let Some(request) = to_request(&fen, token) else {
            println!("{token}: not a legal move here, stopping");
            break;
        };
        let result = orchestrator.make_move(request).await?;
        match (result.success, result.notation) {
            (true, Some(san)) => println!("{:>8}  ({:.2} ms)", san, result.timings.total_ms),
            _ => {
                println!("{token}: {}", result.error.unwrap_or_default());
                break;
            }
        }
    }

    print_state(&orchestrator)?;
    if orchestrator.has_engine() && !orchestrator.get_game_state()?.is_over() {
        let analysis = orchestrator.analyze_with_engine(None).await?;
        println!("Engine:   {}", analysis.summary());
    }
    orchestrator.destroy().await;
    Ok(())
}

async fn analyze(fen: &str) -> Result<()> {
    let mut orchestrator = start().await?;
    orchestrator.load_fen(fen)?;
    print_state(&orchestrator)?;

    if orchestrator.has_engine() {
        let analysis = orchestrator.analyze_with_engine(None).await?;
        println!();
        println!("Engine: {}", analysis.summary());
        for (rank, candidate) in analysis.thinking_moves.iter().enumerate() {
            println!("  {}. {} ({})", rank + 1, candidate.mv.san, candidate.evaluation);
        }
    }
    orchestrator.destroy().await;
    Ok(())
}

async fn pgn(path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let mut orchestrator = start().await?;
    orchestrator.load_pgn(&text)?;
    print_state(&orchestrator)?;
    println!();
    println!("{}", orchestrator.get_pgn()?);
    orchestrator.destroy().await;
    Ok(())
}

fn print_state(orchestrator: &Orchestrator) -> Result<()> {
    let state = orchestrator.get_game_state()?;
    let analysis = orchestrator.analyze_position()?;
    println!();
    println!("FEN:      {}", state.fen);
    println!("Moves:    {}", state.move_count());
    println!("Status:   {}", state.status.as_str());
    println!("Result:   {}", state.result.as_str());
    println!("Endgame:  {}", analysis.endgame_type.as_str());
    println!("Material: {} vs {}", analysis.material_balance.total_white, analysis.material_balance.total_black);
    println!("          {}", analysis.description);
    Ok(())
}
