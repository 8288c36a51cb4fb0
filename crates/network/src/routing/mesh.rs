//! Dimension-order routing on a k×k mesh, plus the mesh port geometry shared
//! with the behavioral network model.

use super::{OutputSet, RoutingContext};
use crate::common::flit::Flit;

/// Output/input port toward larger x (east).
pub const PORT_X_PLUS: usize = 0;
/// Output/input port toward smaller x (west).
pub const PORT_X_MINUS: usize = 1;
/// Output/input port toward larger y (north).
pub const PORT_Y_PLUS: usize = 2;
/// Output/input port toward smaller y (south).
pub const PORT_Y_MINUS: usize = 3;
/// The local port: injection on the input side, ejection on the output side.
pub const PORT_LOCAL: usize = 4;
/// Ports per mesh router, local port included.
pub const NUM_PORTS: usize = 5;

/// Splits a node index into (x, y) mesh coordinates.
#[inline]
pub fn coords(node: usize, k: usize) -> (usize, usize) {
    (node % k, node / k)
}

/// The neighbor reached by leaving `node` through `port`, or `None` at the
/// mesh edge or through the local port.
pub fn neighbor(node: usize, k: usize, port: usize) -> Option<usize> {
    let (x, y) = coords(node, k);
    match port {
        PORT_X_PLUS if x + 1 < k => Some(node + 1),
        PORT_X_MINUS if x > 0 => Some(node - 1),
        PORT_Y_PLUS if y + 1 < k => Some(node + k),
        PORT_Y_MINUS if y > 0 => Some(node - k),
        _ => None,
    }
}

/// The input port at the receiving router for a flit that left through
/// `out_port` (east arrives on the neighbor's west side, and so on).
#[inline]
pub fn opposite(out_port: usize) -> usize {
    match out_port {
        PORT_X_PLUS => PORT_X_MINUS,
        PORT_X_MINUS => PORT_X_PLUS,
        PORT_Y_PLUS => PORT_Y_MINUS,
        PORT_Y_MINUS => PORT_Y_PLUS,
        other => other,
    }
}

/// Manhattan distance between two nodes.
#[inline]
pub fn distance(a: usize, b: usize, k: usize) -> usize {
    let (ax, ay) = coords(a, k);
    let (bx, by) = coords(b, k);
    ax.abs_diff(bx) + ay.abs_diff(by)
}

/// Dimension-order (x-then-y) routing for a k×k mesh.
///
/// During injection (`router = None`) the full VC range is admissible and no
/// port is produced; at a router the function resolves the single output
/// port toward the head's destination, with the local port once both
/// dimensions match. Only head flits are routed: body flits inherit the
/// head's path through the per-VC route lock downstream.
pub fn dim_order_mesh(
    ctx: &RoutingContext,
    router: Option<usize>,
    flit: &Flit,
    _in_channel: Option<usize>,
    output: &mut OutputSet,
    inject: bool,
) {
    output.clear();
    if inject {
        output.add_range(None, 0, ctx.num_vcs - 1);
        return;
    }
    let Some(router) = router else {
        // Route computation away from a router only happens at injection.
        return;
    };
    let Some(dest) = flit.dest else {
        return;
    };
    let (x, y) = coords(router, ctx.k);
    let (dx, dy) = coords(dest, ctx.k);
    let port = if x < dx {
        PORT_X_PLUS
    } else if x > dx {
        PORT_X_MINUS
    } else if y < dy {
        PORT_Y_PLUS
    } else if y > dy {
        PORT_Y_MINUS
    } else {
        PORT_LOCAL
    };
    output.add_range(Some(port), 0, ctx.num_vcs - 1);
}
