use std::sync::Arc;

use api_types::Capabilities;
use api_types::Capacities;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Json;
use poem::web::Path;
use poem::web::Query;
use serde::Deserialize;
use tracing::error;
use tracing::warn;

use super::CellInfo;
use super::CellsResponse;
use crate::cells::types::Result as CellResult;
use crate::cells::CellStateManager;

/// Query parameters for the aggregation endpoints
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    #[serde(default = "default_include_children")]
    pub include_children: bool,
}

fn default_include_children() -> bool {
    true
}

/// Run a manager operation off the async runtime; a synchronization pass may
/// block on directory IO and on the manager's sync lock.
async fn run_blocking<T, F>(manager: &Arc<CellStateManager>, op: F) -> poem::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CellStateManager) -> CellResult<T> + Send + 'static,
{
    let manager = manager.clone();
    tokio::task::spawn_blocking(move || op(&manager))
        .await
        .map_err(|e| {
            error!("Cell state task failed: {e}");
            poem::Error::from_string(
                format!("cell state task failed: {e}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?
        .map_err(|report| {
            error!(error = ?report, "Cell state operation failed");
            poem::Error::from_string(
                report.current_context().to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })
}

/// Get this cell
#[handler]
pub async fn get_self(
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<CellInfo>>> {
    let cell = run_blocking(&manager, |m| m.get_my_state()).await?;
    Ok(Json(CellsResponse::ok(
        cell.describe_for_external_use(),
        format!("Cell {} retrieved successfully", cell.name()),
    )))
}

/// List parent cells
#[handler]
pub async fn list_parents(
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<Vec<CellInfo>>>> {
    let cells = run_blocking(&manager, |m| m.get_parent_cells()).await?;
    Ok(Json(CellsResponse::ok(
        describe_sorted(cells),
        "Parent cells retrieved successfully",
    )))
}

/// List child cells
#[handler]
pub async fn list_children(
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<Vec<CellInfo>>>> {
    let cells = run_blocking(&manager, |m| m.get_child_cells()).await?;
    Ok(Json(CellsResponse::ok(
        describe_sorted(cells),
        "Child cells retrieved successfully",
    )))
}

/// Get one parent cell by name
#[handler]
pub async fn get_parent(
    Path(cell_name): Path<String>,
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<CellInfo>>> {
    let name = cell_name.clone();
    let cell = run_blocking(&manager, move |m| m.get_parent_cell(&name)).await?;
    Ok(Json(found_or_not(cell, &cell_name, "parent")))
}

/// Get one child cell by name
#[handler]
pub async fn get_child(
    Path(cell_name): Path<String>,
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<CellInfo>>> {
    let name = cell_name.clone();
    let cell = run_blocking(&manager, move |m| m.get_child_cell(&name)).await?;
    Ok(Json(found_or_not(cell, &cell_name, "child")))
}

/// Capabilities of this cell, unioned with its children unless
/// `include_children=false`
#[handler]
pub async fn get_capabilities(
    Query(query): Query<AggregateQuery>,
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<Capabilities>>> {
    let include_children = query.include_children;
    let capabilities =
        run_blocking(&manager, move |m| m.get_our_capabilities(include_children)).await?;
    Ok(Json(CellsResponse::ok(
        capabilities,
        "Capabilities retrieved successfully",
    )))
}

/// Capacities of this cell, summed with its children unless
/// `include_children=false`
#[handler]
pub async fn get_capacities(
    Query(query): Query<AggregateQuery>,
    manager: Data<&Arc<CellStateManager>>,
) -> poem::Result<Json<CellsResponse<Capacities>>> {
    let include_children = query.include_children;
    let capacities =
        run_blocking(&manager, move |m| m.get_our_capacities(include_children)).await?;
    Ok(Json(CellsResponse::ok(
        capacities,
        "Capacities retrieved successfully",
    )))
}

fn describe_sorted(cells: Vec<crate::cells::CellState>) -> Vec<CellInfo> {
    let mut infos: Vec<CellInfo> = cells
        .iter()
        .map(|cell| cell.describe_for_external_use())
        .collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    infos
}

fn found_or_not(
    cell: Option<crate::cells::CellState>,
    cell_name: &str,
    kind: &str,
) -> CellsResponse<CellInfo> {
    match cell {
        Some(cell) => CellsResponse::ok(
            cell.describe_for_external_use(),
            format!("Cell {cell_name} retrieved successfully"),
        ),
        None => {
            warn!(cell_name, kind, "Cell not found");
            CellsResponse::not_found(format!("No {kind} cell named {cell_name}"))
        }
    }
}
