use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use chess_orchestrator_core::serde_chess;
use chess_orchestrator_core::{
    EndgameAnalysis, GameMode, GameState, MoveRequest, MoveResult, SyncReport, ThinkingMove,
};

use crate::error::ApiResult;
use crate::SharedState;

#[derive(Deserialize)]
pub struct FenBody {
    pub fen: String,
}

#[derive(Deserialize, Default)]
pub struct ResignBody {
    #[serde(default, with = "serde_chess::opt_color")]
    pub color: Option<Color>,
}

#[derive(Serialize)]
pub struct UndoResponse {
    pub undone: bool,
    pub state: GameState,
}

#[derive(Serialize)]
pub struct ResignResponse {
    pub resigned: bool,
    pub state: GameState,
}

#[derive(Serialize)]
pub struct AiMoveResponse {
    /// Null when it was not the engine's turn
    pub result: Option<MoveResult>,
    pub state: GameState,
}

#[derive(Serialize)]
pub struct PgnResponse {
    pub pgn: String,
}

pub async fn state(State(state): State<SharedState>) -> ApiResult<GameState> {
    let orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.get_game_state()?))
}

pub async fn new_game(State(state): State<SharedState>) -> ApiResult<GameState> {
    let mut orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.new_game().await?))
}

pub async fn load_fen(State(state): State<SharedState>, Json(body): Json<FenBody>) -> ApiResult<GameState> {
    let mut orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.load_fen(&body.fen)?))
}

pub async fn make_move(State(state): State<SharedState>, Json(request): Json<MoveRequest>) -> ApiResult<MoveResult> {
    let mut orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.make_move(request).await?))
}

pub async fn undo(State(state): State<SharedState>) -> ApiResult<UndoResponse> {
    let mut orchestrator = state.orchestrator.lock().await;
    let undone = orchestrator.undo_move().await?;
    Ok(Json(UndoResponse {
        undone,
        state: orchestrator.get_game_state()?,
    }))
}

pub async fn resign(State(state): State<SharedState>, body: Option<Json<ResignBody>>) -> ApiResult<ResignResponse> {
    let Json(body) = body.unwrap_or_default();
    let mut orchestrator = state.orchestrator.lock().await;
    let resigned = orchestrator.resign_game(body.color).await?;
    Ok(Json(ResignResponse {
        resigned,
        state: orchestrator.get_game_state()?,
    }))
}

pub async fn set_mode(State(state): State<SharedState>, Json(mode): Json<GameMode>) -> ApiResult<GameMode> {
    let mut orchestrator = state.orchestrator.lock().await;
    orchestrator.set_game_mode(mode);
    Ok(Json(orchestrator.game_mode()))
}

pub async fn pgn(State(state): State<SharedState>) -> ApiResult<PgnResponse> {
    let orchestrator = state.orchestrator.lock().await;
    Ok(Json(PgnResponse {
        pgn: orchestrator.get_pgn()?,
    }))
}

pub async fn analysis(State(state): State<SharedState>) -> ApiResult<EndgameAnalysis> {
    let orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.analyze_position()?))
}

pub async fn ai_move(State(state): State<SharedState>) -> ApiResult<AiMoveResponse> {
    let mut orchestrator = state.orchestrator.lock().await;
    let result = orchestrator.trigger_ai_move().await?;
    Ok(Json(AiMoveResponse {
        result,
        state: orchestrator.get_game_state()?,
    }))
}

pub async fn thinking(State(state): State<SharedState>) -> Json<Vec<ThinkingMove>> {
    let orchestrator = state.orchestrator.lock().await;
    Json(orchestrator.get_ai_thinking_moves())
}

pub async fn sync(State(state): State<SharedState>) -> ApiResult<SyncReport> {
    let mut orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.validate_component_synchronization()?))
}
