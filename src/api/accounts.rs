use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Address, Decimal, LiquidityPosition, TokenAmount};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub address: Address,
    pub linear_points: Decimal,
    pub boosted_points: Decimal,
    /// Tracked token balance; zero when the address holds none.
    pub balance: TokenAmount,
    pub last_settled_at: Option<i64>,
}

fn parse_address(raw: &str) -> Result<Address, AppError> {
    Address::from_str(raw).map_err(|_| AppError::BadRequest("Invalid address".into()))
}

pub async fn get_account(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, AppError> {
    let address = parse_address(&address)?;

    let (account, tracker) = futures::try_join!(
        state.repo.get_account(&address),
        state.repo.get_tracker(&address),
    )?;
    if account.is_none() && tracker.is_none() {
        return Err(AppError::NotFound(format!("No ledger entry for {}", address)));
    }

    let (linear_points, boosted_points) = account
        .map(|a| (a.linear_points, a.boosted_points))
        .unwrap_or_default();
    let (balance, last_settled_at) = tracker
        .map(|t| (t.balance, t.last_settled_at.map(|ts| ts.as_ms())))
        .unwrap_or_default();

    Ok(Json(AccountResponse {
        address,
        linear_points,
        boosted_points,
        balance,
        last_settled_at,
    }))
}

pub async fn get_account_positions(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LiquidityPosition>>, AppError> {
    let address = parse_address(&address)?;
    let positions = state.repo.list_positions(Some(&address)).await?;
    Ok(Json(positions))
}
