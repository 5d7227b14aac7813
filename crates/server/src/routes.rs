//! Route table, request/response shapes, and handlers.
//!
//! Handlers stay thin: deserialize, call the core, serialize. The one piece
//! of wiring beyond that is in [`sign`]: a successful signature is recorded
//! in the audit ledger before the response goes out, so every signing event
//! leaves a block behind.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use signet_hsm::{GeneratedKeyPair, HsmConnector, Pin, SlotId};
use signet_ledger::Block;

use crate::{error::ApiError, state::AppState};

/// Request body for `POST /v1/sign`.
#[derive(Debug, Deserialize)]
pub struct SignRequest {
    /// Slot holding the signing key.
    pub slot_id: u64,
    /// User PIN for the slot.
    pub user_pin: String,
    /// Label of the private key object.
    pub key_label: String,
    /// Message to sign (UTF-8 text).
    pub message: String,
}

/// Response body for `POST /v1/sign`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignResponse {
    /// RSA signature, lowercase hex.
    pub signature: String,
    /// Index of the audit block recording this event.
    pub audit_block_index: u64,
}

/// Request body for `POST /v1/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Slot holding the verification key.
    pub slot_id: u64,
    /// User PIN for the slot.
    pub user_pin: String,
    /// Label of the public key object.
    pub key_label: String,
    /// Message the signature claims to cover (UTF-8 text).
    pub message: String,
    /// Signature to check, hex-encoded.
    pub signature: String,
}

/// Response body for `POST /v1/verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the signature checks out. A cryptographic mismatch is
    /// `false` here with HTTP 200, never an error status.
    pub valid: bool,
}

/// Request body for `POST /v1/keys/rsa`.
#[derive(Debug, Deserialize)]
pub struct GenerateKeyRequest {
    /// Slot to create the pair on.
    pub slot_id: u64,
    /// User PIN for the slot.
    pub user_pin: String,
    /// RSA modulus length in bits.
    pub key_size: u64,
    /// Base label; the halves get `_pub` / `_priv` suffixes.
    pub key_label: String,
}

/// Request body for `POST /v1/ledger/blocks`.
#[derive(Debug, Deserialize)]
pub struct AppendBlockRequest {
    /// Event description to record.
    pub payload: String,
    /// Signature value associated with the event.
    pub signature: String,
}

/// Builds the full route table over the given state.
pub fn build_router<C>(state: AppState<C>) -> Router
where
    C: HsmConnector + Clone + 'static,
{
    Router::new()
        .route("/v1/sign", post(sign::<C>))
        .route("/v1/verify", post(verify::<C>))
        .route("/v1/keys/rsa", post(generate_key::<C>))
        .route("/v1/ledger/blocks", post(append_block::<C>).get(list_blocks::<C>))
        .route("/v1/health", get(health::<C>))
        .with_state(state)
}

async fn sign<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    let signature = state
        .service
        .sign(SlotId(req.slot_id), Pin::from(req.user_pin), &req.key_label, req.message.as_bytes())
        .await?;
    let signature = hex::encode(signature);

    // Audit before answering: a signature we cannot record is a failure.
    let block = state
        .ledger
        .append(
            format!("signed with key {} on slot {}", req.key_label, req.slot_id),
            signature.clone(),
        )
        .await?;

    Ok(Json(SignResponse { signature, audit_block_index: block.index }))
}

async fn verify<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    let signature = hex::decode(&req.signature)
        .map_err(|e| ApiError::BadRequest(format!("signature is not valid hex: {e}")))?;

    let valid = state
        .service
        .verify(
            SlotId(req.slot_id),
            Pin::from(req.user_pin),
            &req.key_label,
            req.message.as_bytes(),
            &signature,
        )
        .await?;

    Ok(Json(VerifyResponse { valid }))
}

async fn generate_key<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<GenerateKeyRequest>,
) -> Result<Json<GeneratedKeyPair>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    let pair = state
        .service
        .generate_key_pair(
            SlotId(req.slot_id),
            Pin::from(req.user_pin),
            req.key_size,
            &req.key_label,
        )
        .await?;

    Ok(Json(pair))
}

async fn append_block<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<AppendBlockRequest>,
) -> Result<Json<Block>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    let block = state.ledger.append(req.payload, req.signature).await?;
    Ok(Json(block))
}

async fn list_blocks<C>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<Block>>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    Ok(Json(state.ledger.list().await))
}

async fn health<C>(State(state): State<AppState<C>>) -> Result<Json<serde_json::Value>, ApiError>
where
    C: HsmConnector + Clone + 'static,
{
    state.ledger.health_check().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
