//! Shared EdgeBreaker definitions and the connectivity reconstruction.
//!
//! The decoder rebuilds the mesh from the reversed symbol stream; the
//! encoder replays the same reconstruction to verify that its traversal
//! and the decoder's agree before any attribute is committed to the
//! stream.

use crate::error::{corrupt, Result};
use crate::indices::CornerIndex;
use std::collections::HashMap;

/// The five traversal symbols, one per face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClersSymbol {
    C = 0,
    S = 1,
    L = 2,
    R = 3,
    E = 4,
}

pub(crate) const CLERS_SYMBOL_BITS: u32 = 3;

impl ClersSymbol {
    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            0 => Self::C,
            1 => Self::S,
            2 => Self::L,
            3 => Self::R,
            4 => Self::E,
            other => return Err(corrupt(format!("invalid traversal symbol {other}"))),
        })
    }
}

/// A handle event: the traversal reconnected to the face of an earlier S
/// symbol. Symbol indices are in encoder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TopologySplit {
    pub source_symbol: u32,
    pub split_symbol: u32,
    pub source_on_right: bool,
}

/// Connectivity produced by [`rebuild_connectivity`]: faces over compacted
/// vertex ids, in decode order.
#[derive(Debug)]
pub(crate) struct RebuiltConnectivity {
    pub face_vertices: Vec<[u32; 3]>,
    pub num_vertices: usize,
}

struct Rebuilder {
    opposites: Vec<CornerIndex>,
    corner_vertex: Vec<u32>,
    // Union-find over temporary vertex ids; S symbols merge two ids.
    parent: Vec<u32>,
    leftmost: Vec<CornerIndex>,
    next_vertex: u32,
}

impl Rebuilder {
    fn new(total_faces: usize, max_vertices: usize) -> Self {
        Self {
            opposites: vec![CornerIndex::INVALID; total_faces * 3],
            corner_vertex: vec![u32::MAX; total_faces * 3],
            parent: Vec::with_capacity(max_vertices),
            leftmost: Vec::with_capacity(max_vertices),
            next_vertex: 0,
        }
    }

    fn new_vertex(&mut self, max_vertices: usize) -> Result<u32> {
        if self.next_vertex as usize >= max_vertices {
            return Err(corrupt("more vertices decoded than declared"));
        }
        let v = self.next_vertex;
        self.next_vertex += 1;
        self.parent.push(v);
        self.leftmost.push(CornerIndex::INVALID);
        Ok(v)
    }

    fn find(&mut self, mut v: u32) -> u32 {
        while self.parent[v as usize] != v {
            let grand = self.parent[self.parent[v as usize] as usize];
            self.parent[v as usize] = grand;
            v = grand;
        }
        v
    }

    fn vertex_at(&mut self, c: CornerIndex) -> Result<u32> {
        let raw = self.corner_vertex[c.index()];
        if raw == u32::MAX {
            return Err(corrupt("corner has no vertex during reconstruction"));
        }
        Ok(self.find(raw))
    }

    fn link(&mut self, a: CornerIndex, b: CornerIndex) {
        self.opposites[a.index()] = b;
        self.opposites[b.index()] = a;
    }

    fn has_opposite(&self, c: CornerIndex) -> bool {
        self.opposites[c.index()].is_valid()
    }

    fn next(c: CornerIndex) -> CornerIndex {
        if c.0 % 3 == 2 {
            CornerIndex(c.0 - 2)
        } else {
            CornerIndex(c.0 + 1)
        }
    }

    fn prev(c: CornerIndex) -> CornerIndex {
        if c.0 % 3 == 0 {
            CornerIndex(c.0 + 2)
        } else {
            CornerIndex(c.0 - 1)
        }
    }
}

/// Rebuilds connectivity from `symbols` (already reversed into decode
/// order) and the handle events. `start_bit` supplies one
/// interior-configuration bit per component, in pop order.
pub(crate) fn rebuild_connectivity(
    symbols: &[ClersSymbol],
    splits: &[TopologySplit],
    total_faces: usize,
    max_vertices: usize,
    start_bit: &mut dyn FnMut() -> Result<bool>,
) -> Result<RebuiltConnectivity> {
    let num_symbols = symbols.len();
    if num_symbols > total_faces {
        return Err(corrupt("more traversal symbols than faces"));
    }

    // Events keyed by the decode-order index of their source symbol.
    let mut events_by_source: HashMap<u32, Vec<(u32, bool)>> = HashMap::new();
    for split in splits {
        if split.source_symbol as usize >= num_symbols
            || split.split_symbol as usize >= num_symbols
        {
            return Err(corrupt("topology split references a missing symbol"));
        }
        let source_decode = (num_symbols as u32) - split.source_symbol - 1;
        let split_decode = (num_symbols as u32) - split.split_symbol - 1;
        events_by_source
            .entry(source_decode)
            .or_default()
            .push((split_decode, split.source_on_right));
    }

    let mut rb = Rebuilder::new(total_faces, max_vertices);
    let mut active_stack: Vec<CornerIndex> = Vec::new();
    let mut split_active_corners: HashMap<u32, CornerIndex> = HashMap::new();

    for (i, &symbol) in symbols.iter().enumerate() {
        let t = CornerIndex((i * 3) as u32);
        let t1 = CornerIndex(t.0 + 1);
        let t2 = CornerIndex(t.0 + 2);
        let mut reached_boundary = false;

        match symbol {
            ClersSymbol::E => {
                let v0 = rb.new_vertex(max_vertices)?;
                let v1 = rb.new_vertex(max_vertices)?;
                let v2 = rb.new_vertex(max_vertices)?;
                rb.corner_vertex[t.index()] = v0;
                rb.corner_vertex[t1.index()] = v1;
                rb.corner_vertex[t2.index()] = v2;
                rb.leftmost[v0 as usize] = t;
                rb.leftmost[v1 as usize] = t1;
                rb.leftmost[v2 as usize] = t2;
                active_stack.push(t);
                reached_boundary = true;
            }
            ClersSymbol::C => {
                let corner_a = *active_stack
                    .last()
                    .ok_or_else(|| corrupt("empty traversal stack on C"))?;
                let vertex_x = rb.vertex_at(Rebuilder::next(corner_a))?;
                let lmc_x = rb.leftmost[vertex_x as usize];
                if !lmc_x.is_valid() {
                    return Err(corrupt("C symbol on a vertex without a boundary corner"));
                }
                let corner_b = Rebuilder::next(lmc_x);
                if corner_a == corner_b
                    || rb.has_opposite(corner_a)
                    || rb.has_opposite(corner_b)
                {
                    return Err(corrupt("invalid C symbol configuration"));
                }
                rb.link(corner_a, t1);
                rb.link(corner_b, t2);

                let vert_a_prev = rb.vertex_at(Rebuilder::prev(corner_a))?;
                let vert_b_next = rb.vertex_at(Rebuilder::next(corner_b))?;
                if vertex_x == vert_a_prev || vertex_x == vert_b_next {
                    return Err(corrupt("degenerate C symbol"));
                }
                rb.corner_vertex[t.index()] = vertex_x;
                rb.corner_vertex[t1.index()] = vert_b_next;
                rb.corner_vertex[t2.index()] = vert_a_prev;
                rb.leftmost[vert_a_prev as usize] = t2;
                *active_stack.last_mut().unwrap() = t;
            }
            ClersSymbol::R | ClersSymbol::L => {
                let corner_a = *active_stack
                    .last()
                    .ok_or_else(|| corrupt("empty traversal stack on L/R"))?;
                if rb.has_opposite(corner_a) {
                    return Err(corrupt("active corner already linked on L/R"));
                }
                let (opp_corner, corner_l, corner_r) = if symbol == ClersSymbol::R {
                    (t2, t1, t)
                } else {
                    (t1, t, t2)
                };
                rb.link(opp_corner, corner_a);

                let new_vert = rb.new_vertex(max_vertices)?;
                rb.corner_vertex[opp_corner.index()] = new_vert;
                rb.leftmost[new_vert as usize] = opp_corner;

                let vertex_r = rb.vertex_at(Rebuilder::prev(corner_a))?;
                rb.corner_vertex[corner_r.index()] = vertex_r;
                rb.leftmost[vertex_r as usize] = corner_r;

                let vertex_l = rb.vertex_at(Rebuilder::next(corner_a))?;
                rb.corner_vertex[corner_l.index()] = vertex_l;

                *active_stack.last_mut().unwrap() = t;
                reached_boundary = true;
            }
            ClersSymbol::S => {
                let corner_b = active_stack
                    .pop()
                    .ok_or_else(|| corrupt("empty traversal stack on S"))?;
                if let Some(&split_corner) = split_active_corners.get(&(i as u32)) {
                    active_stack.push(split_corner);
                }
                let corner_a = *active_stack
                    .last()
                    .ok_or_else(|| corrupt("traversal stack exhausted after split on S"))?;
                if corner_a == corner_b
                    || rb.has_opposite(corner_a)
                    || rb.has_opposite(corner_b)
                {
                    return Err(corrupt("invalid S symbol configuration"));
                }
                rb.link(corner_a, t2);
                rb.link(corner_b, t1);

                let vertex_p = rb.vertex_at(Rebuilder::prev(corner_a))?;
                let vertex_a_next = rb.vertex_at(Rebuilder::next(corner_a))?;
                let vert_b_prev = rb.vertex_at(Rebuilder::prev(corner_b))?;
                rb.corner_vertex[t.index()] = vertex_p;
                rb.corner_vertex[t1.index()] = vertex_a_next;
                rb.corner_vertex[t2.index()] = vert_b_prev;
                rb.leftmost[vert_b_prev as usize] = t2;

                // The two active boundaries meet: merge the far vertex into
                // the apex.
                let vertex_n = rb.vertex_at(Rebuilder::next(corner_b))?;
                if vertex_n != vertex_p {
                    let lmc_n = rb.leftmost[vertex_n as usize];
                    if lmc_n.is_valid() {
                        rb.leftmost[vertex_p as usize] = lmc_n;
                    }
                    rb.parent[vertex_n as usize] = vertex_p;
                }
                *active_stack.last_mut().unwrap() = t;
            }
        }

        if reached_boundary {
            if let Some(events) = events_by_source.get(&(i as u32)) {
                let top = *active_stack
                    .last()
                    .ok_or_else(|| corrupt("empty traversal stack on split event"))?;
                for &(split_decode, on_right) in events {
                    let new_active = if on_right {
                        Rebuilder::next(top)
                    } else {
                        Rebuilder::prev(top)
                    };
                    split_active_corners.insert(split_decode, new_active);
                }
            }
        }
    }

    // Remaining active corners are component roots; a set start bit closes
    // the component with an interior seed face.
    let mut num_faces = num_symbols;
    while let Some(corner_a) = active_stack.pop() {
        if !start_bit()? {
            continue;
        }
        if num_faces >= total_faces {
            return Err(corrupt("more faces decoded than declared"));
        }
        let vert_n = rb.vertex_at(Rebuilder::next(corner_a))?;
        let lmc_n = rb.leftmost[vert_n as usize];
        if !lmc_n.is_valid() {
            return Err(corrupt("missing boundary corner on start face"));
        }
        let corner_b = Rebuilder::next(lmc_n);
        let vert_x = rb.vertex_at(Rebuilder::next(corner_b))?;
        let lmc_x = rb.leftmost[vert_x as usize];
        if !lmc_x.is_valid() {
            return Err(corrupt("missing boundary corner on start face"));
        }
        let corner_c = Rebuilder::next(lmc_x);
        if corner_a == corner_b || corner_a == corner_c || corner_b == corner_c {
            return Err(corrupt("invalid start face configuration"));
        }
        if rb.has_opposite(corner_a) || rb.has_opposite(corner_b) || rb.has_opposite(corner_c) {
            return Err(corrupt("start face corner already linked"));
        }
        let vert_p = rb.vertex_at(Rebuilder::next(corner_c))?;

        let base = CornerIndex((num_faces * 3) as u32);
        num_faces += 1;
        rb.link(base, corner_a);
        rb.link(CornerIndex(base.0 + 1), corner_b);
        rb.link(CornerIndex(base.0 + 2), corner_c);
        rb.corner_vertex[base.index()] = vert_x;
        rb.corner_vertex[base.index() + 1] = vert_p;
        rb.corner_vertex[base.index() + 2] = vert_n;
    }

    if num_faces != total_faces {
        return Err(corrupt("face count mismatch after reconstruction"));
    }

    // Compact the surviving vertex ids in ascending order.
    let mut roots: Vec<u32> = Vec::with_capacity(rb.next_vertex as usize);
    for c in 0..total_faces * 3 {
        roots.push(rb.vertex_at(CornerIndex(c as u32))?);
    }
    let mut used = roots.clone();
    used.sort_unstable();
    used.dedup();
    let mut remap = vec![u32::MAX; rb.next_vertex as usize];
    for (new_id, &old) in used.iter().enumerate() {
        remap[old as usize] = new_id as u32;
    }

    let mut face_vertices = Vec::with_capacity(total_faces);
    for f in 0..total_faces {
        face_vertices.push([
            remap[roots[f * 3] as usize],
            remap[roots[f * 3 + 1] as usize],
            remap[roots[f * 3 + 2] as usize],
        ]);
    }
    Ok(RebuiltConnectivity {
        face_vertices,
        num_vertices: used.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    fn no_splits() -> Vec<TopologySplit> {
        Vec::new()
    }

    #[test]
    fn single_e_symbol_builds_one_triangle() {
        let mut bits = vec![false];
        let mut next_bit = || -> Result<bool> { Ok(bits.pop().unwrap()) };
        let rebuilt =
            rebuild_connectivity(&[ClersSymbol::E], &no_splits(), 1, 3, &mut next_bit).unwrap();
        assert_eq!(rebuilt.num_vertices, 3);
        assert_eq!(rebuilt.face_vertices, vec![[0, 1, 2]]);
    }

    #[test]
    fn l_after_e_builds_a_quad() {
        // Encode order [L, E] reverses to [E, L].
        let mut bits = vec![false];
        let mut next_bit = || -> Result<bool> { Ok(bits.pop().unwrap()) };
        let rebuilt = rebuild_connectivity(
            &[ClersSymbol::E, ClersSymbol::L],
            &no_splits(),
            2,
            4,
            &mut next_bit,
        )
        .unwrap();
        assert_eq!(rebuilt.num_vertices, 4);
        assert_eq!(rebuilt.face_vertices.len(), 2);
        // The two faces share exactly one edge (two vertices).
        let shared: Vec<u32> = rebuilt.face_vertices[0]
            .iter()
            .filter(|v| rebuilt.face_vertices[1].contains(v))
            .copied()
            .collect();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn truncated_symbol_stream_is_corrupt() {
        // A C symbol with nothing on the stack must fail cleanly.
        let mut next_bit = || -> Result<bool> { Ok(false) };
        let err = rebuild_connectivity(&[ClersSymbol::C], &no_splits(), 1, 3, &mut next_bit)
            .unwrap_err();
        assert!(matches!(err, CodecError::CorruptBitstream(_)));
    }

    #[test]
    fn vertex_budget_is_enforced() {
        let mut next_bit = || -> Result<bool> { Ok(false) };
        let err = rebuild_connectivity(&[ClersSymbol::E], &no_splits(), 1, 2, &mut next_bit)
            .unwrap_err();
        assert!(matches!(err, CodecError::CorruptBitstream(_)));
    }
}
