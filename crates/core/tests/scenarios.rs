//! End-to-end behaviour through the public API

use chess_orchestrator_core::endgame::{analyze_oracle, is_insufficient_material, Advantage};
use chess_orchestrator_core::engine::{Evaluation, Score, MATE_SENTINEL};
use chess_orchestrator_core::history::MoveHistoryManager;
use chess_orchestrator_core::notation::{generate_pgn, get_moves_from_pgn, PgnOptions};
use chess_orchestrator_core::{
    EndReason, EndgameType, GameResult, GameStatus, MoveRequest, Orchestrator, OrchestratorConfig, RulesOracle,
    STARTING_FEN,
};
use shakmaty::{fen::Fen, CastlingMode, Chess, Color, Square};

fn play_san(oracle: &mut RulesOracle, sans: &[&str]) {
    for san in sans {
        oracle
            .make_san_move(san)
            .unwrap_or_else(|e| panic!("{san}: {e}"));
    }
}

fn position(fen: &str) -> Chess {
    fen.parse::<Fen>()
        .unwrap()
        .into_position(CastlingMode::Standard)
        .unwrap()
}

#[test]
fn test_validation_never_mutates() {
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &["e4", "e5", "Nf3"]);
    let fen = oracle.get_fen();
    let moves = oracle.get_move_history().to_vec();
    let positions = oracle.repetition().positions().to_vec();

    for from in Square::ALL {
        for to in [Square::E4, Square::F6, Square::C6, Square::E7, Square::A1] {
            let _ = oracle.validate_move(from, to, None);
        }
    }

    assert_eq!(oracle.get_fen(), fen);
    assert_eq!(oracle.get_move_history(), moves.as_slice());
    assert_eq!(oracle.repetition().positions(), positions.as_slice());
}

#[test]
fn test_fen_round_trip() {
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &["d4", "Nf6", "c4", "e6", "Nc3", "Bb4"]);
    let fen = oracle.get_fen();

    let reloaded = RulesOracle::from_fen(&fen).unwrap();
    assert_eq!(reloaded.get_fen(), fen);
}

#[test]
fn test_pgn_round_trip() {
    let sans = ["e4", "c5", "Nf3", "d6", "d4", "cxd4", "Nxd4", "Nf6", "Nc3", "a6", "Be2", "e5", "Nb3", "Be7", "O-O", "O-O"];
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &sans);

    let pgn = generate_pgn(oracle.get_move_history(), &PgnOptions::default());
    assert_eq!(get_moves_from_pgn(&pgn).unwrap(), sans);
}

#[test]
fn test_threefold_repetition() {
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1"]);
    assert_ne!(oracle.get_game_status(), GameStatus::Draw);

    play_san(&mut oracle, &["Ng8"]);
    assert_eq!(oracle.get_game_status(), GameStatus::Draw);
    assert_eq!(oracle.get_draw_reason(), Some(EndReason::ThreefoldRepetition));
    // Clocks differ from the initial position, the repetition still counts
    assert_ne!(oracle.get_fen(), STARTING_FEN);
    assert_eq!(analyze_oracle(&oracle).repetition_count, 3);
}

#[test]
fn test_branch_truncation() {
    let mut oracle = RulesOracle::new();
    let mut history = MoveHistoryManager::default();
    for san in ["e4", "e5", "Nf3", "Nc6"] {
        let before = oracle.get_fen();
        let outcome = oracle.make_san_move(san).unwrap();
        history.add_move(outcome.mv, before, None, None, Vec::new());
    }

    assert!(history.go_to_move(1));
    let mut branch = RulesOracle::replay(STARTING_FEN, &history.moves_to_cursor()).unwrap();
    let before = branch.get_fen();
    let outcome = branch.make_san_move("Bc4").unwrap();
    history.add_move(outcome.mv, before, None, None, Vec::new());

    assert_eq!(history.get_total_moves(), 3);
    assert_eq!(history.get_move_at(2).unwrap().mv.san, "Bc4");
    assert!(history.get_move_at(3).is_none());
}

#[test]
fn test_mate_score_sign() {
    assert_eq!(Evaluation::from_score(Score::Mate(3), Color::White).value(), MATE_SENTINEL);
    assert_eq!(Evaluation::from_score(Score::Mate(3), Color::Black).value(), -MATE_SENTINEL);
    assert_eq!(Evaluation::from_score(Score::Mate(-3), Color::White).value(), -MATE_SENTINEL);
    assert_eq!(Evaluation::from_score(Score::Mate(-3), Color::Black).value(), MATE_SENTINEL);
}

#[test]
fn test_insufficient_material() {
    assert!(is_insufficient_material(&position("8/8/8/4k3/8/8/8/4K3 w - - 0 1")));
    assert!(is_insufficient_material(&position("8/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
    // c1 and f8 are both dark
    assert!(is_insufficient_material(&position("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
    // c1 dark, c8 light
    assert!(!is_insufficient_material(&position("2b5/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
    assert!(!is_insufficient_material(&position("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1")));
}

#[test]
fn test_scholars_mate() {
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &["e4", "e5", "Bc4", "Nc6", "Qh5", "Nf6", "Qxf7#"]);
    let analysis = analyze_oracle(&oracle);
    assert_eq!(analysis.status, GameStatus::Checkmate);
    assert_eq!(analysis.result, GameResult::WhiteWins);
}

#[test]
fn test_fools_mate() {
    let mut oracle = RulesOracle::new();
    play_san(&mut oracle, &["f3", "e5", "g4", "Qh4#"]);
    let analysis = analyze_oracle(&oracle);
    assert_eq!(analysis.status, GameStatus::Checkmate);
    assert_eq!(analysis.result, GameResult::BlackWins);
    assert!(analysis.description.contains("checkmate"));
}

#[test]
fn test_starting_position_analysis() {
    let analysis = analyze_oracle(&RulesOracle::new());
    assert_eq!(analysis.endgame_type, EndgameType::ComplexEndgame);
    assert_eq!(analysis.material_balance.advantage, Advantage::Balanced);
    assert_eq!(analysis.material_balance.total_white, 39);
    assert_eq!(analysis.material_balance.total_black, 39);
}

#[tokio::test]
async fn test_orchestrator_move_then_undo() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
    orchestrator.initialize().await.unwrap();

    let result = orchestrator.make_move(MoveRequest::new("e2", "e4")).await.unwrap();
    assert!(result.success);
    assert!(orchestrator.undo_move().await.unwrap());

    assert_eq!(orchestrator.history().get_total_moves(), 0);
    assert_eq!(orchestrator.get_game_state().unwrap().fen, STARTING_FEN);
    assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
}
