//! Sparse symmetric linear solver for the network flow-head equations.
//!
//! Builds node-link adjacency lists with parallel links collapsed, applies
//! a minimum-degree re-ordering restricted to junction nodes, symbolically
//! factorizes the re-ordered matrix into compressed column storage
//! (`xlnz` / `nzsub` / `lnz`), and solves the numeric system by sparse
//! Cholesky factorization with forward and backward substitution. The
//! symbolic structure is computed once per solver open and reused across
//! Newton iterations.
//!
//! The factorization follows subroutines GSFCT and GSSLV of George & Liu,
//! "Computer Solution of Large Sparse Positive Definite Systems".

use crate::network::Network;

/// One adjacency entry: a neighboring node and the connecting link (or
/// fill-in coefficient slot).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Adj {
    pub node: usize,
    pub link: usize,
}

/// Solution-matrix scratch owned by a project while a hydraulic solver is
/// open. All index vectors are 1-based with slot 0 unused.
#[derive(Debug)]
pub(crate) struct Solver {
    pub njuncs: usize,
    pub nnodes: usize,
    pub nlinks: usize,
    /// Number of off-diagonal coefficient slots (links + fill-ins).
    pub ncoeffs: usize,
    /// `order[k]` = node eliminated at position k.
    pub order: Vec<usize>,
    /// `row[n]` = solution-matrix row of node n.
    pub row: Vec<usize>,
    /// `ndx[k]` = coefficient slot of link k (parallel links share a slot).
    pub ndx: Vec<usize>,
    /// Column start pointers into `nzsub`.
    pub xlnz: Vec<usize>,
    /// Row index of each non-zero, ascending within a column.
    pub nzsub: Vec<usize>,
    /// Coefficient slot of each non-zero.
    pub lnz: Vec<usize>,
    /// Full adjacency (parallel links kept), for connectivity scans.
    pub adj: Vec<Vec<Adj>>,
    /// Diagonal coefficients by matrix row.
    pub aii: Vec<f64>,
    /// Off-diagonal coefficients by slot.
    pub aij: Vec<f64>,
    /// Right-hand side / solution by matrix row.
    pub f: Vec<f64>,
    /// Inverse head loss gradient per link.
    pub p: Vec<f64>,
    /// Flow correction term per link.
    pub y: Vec<f64>,
    /// Net inflow accumulator per node.
    pub x_acc: Vec<f64>,
}

impl Solver {
    /// Creates the sparse representation of the coefficient matrix for the
    /// current network topology.
    pub fn create(net: &Network) -> Self {
        let nnodes = net.nnodes();
        let nlinks = net.nlinks();
        let njuncs = net.njuncs();

        let mut solver = Solver {
            njuncs,
            nnodes,
            nlinks,
            ncoeffs: nlinks,
            order: (0..=nnodes).collect(),
            row: (0..=nnodes).collect(),
            ndx: vec![0; nlinks + 1],
            xlnz: Vec::new(),
            nzsub: Vec::new(),
            lnz: Vec::new(),
            adj: vec![Vec::new(); nnodes + 1],
            aii: Vec::new(),
            aij: Vec::new(),
            f: Vec::new(),
            p: Vec::new(),
            y: Vec::new(),
            x_acc: Vec::new(),
        };

        solver.build_lists(net, true);
        let mut degree = vec![0usize; nnodes + 1];
        solver.count_degree(&mut degree);
        solver.reorder_nodes(&mut degree);
        solver.store_sparse(njuncs);
        solver.order_sparse(njuncs);

        // Re-build adjacency without collapsing parallel links for use in
        // connectivity checking.
        solver.build_lists(net, false);

        solver.aii = vec![0.0; nnodes + 1];
        solver.aij = vec![0.0; solver.ncoeffs + 1];
        solver.f = vec![0.0; nnodes + 1];
        solver.p = vec![0.0; nlinks + 1];
        solver.y = vec![0.0; nlinks + 1];
        solver.x_acc = vec![0.0; nnodes + 1];
        solver
    }

    /// Builds the adjacency list of each node. With `collapse` set,
    /// parallel links are merged into a single entry for the symbolic
    /// phase and `ndx` records the shared coefficient slot.
    fn build_lists(&mut self, net: &Network, collapse: bool) {
        for list in &mut self.adj {
            list.clear();
        }
        for k in 1..=self.nlinks {
            let link = net.link(k);
            let (i, j) = (link.n1, link.n2);
            if collapse {
                if let Some(existing) = self.adj[i].iter().find(|a| a.node == j) {
                    // Parallel link: share the stored-coefficient slot.
                    self.ndx[k] = existing.link;
                    continue;
                }
                self.ndx[k] = k;
            }
            self.adj[i].push(Adj { node: j, link: k });
            self.adj[j].push(Adj { node: i, link: k });
        }
    }

    /// Counts nodes directly connected to each junction. Fixed-grade nodes
    /// keep zero degree so they are placed last and never produce fill-in.
    fn count_degree(&self, degree: &mut [usize]) {
        degree.iter_mut().for_each(|d| *d = 0);
        for i in 1..=self.njuncs {
            degree[i] = self.adj[i].len();
        }
    }

    /// Re-orders junction nodes by minimum degree, augmenting adjacency
    /// lists with fill-in edges and counting the resulting non-zeros.
    fn reorder_nodes(&mut self, degree: &mut [usize]) {
        for k in 1..=self.nnodes {
            self.row[k] = k;
            self.order[k] = k;
        }
        let n = self.njuncs;
        for k in 1..=n {
            let m = self.min_degree(k, n, degree);
            let knode = self.order[m];
            self.grow_list(knode, degree);
            self.order[m] = self.order[k];
            self.order[k] = knode;
            degree[knode] = 0;
        }
        for k in 1..=n {
            self.row[self.order[k]] = k;
        }
    }

    /// Active node with the fewest direct connections; ties break in
    /// current array order.
    fn min_degree(&self, k: usize, n: usize, degree: &[usize]) -> usize {
        let mut min = n;
        let mut imin = n;
        for i in k..=n {
            let m = degree[self.order[i]];
            if m < min {
                min = m;
                imin = i;
            }
        }
        imin
    }

    /// Eliminates `knode`: every pair of its remaining active neighbors
    /// that is not already adjacent gains a fill-in edge.
    fn grow_list(&mut self, knode: usize, degree: &mut [usize]) {
        let neighbors = self.adj[knode].clone();
        for (pos, a) in neighbors.iter().enumerate() {
            let inode = a.node;
            if degree[inode] == 0 {
                continue;
            }
            degree[inode] -= 1;
            for b in &neighbors[pos + 1..] {
                let jnode = b.node;
                if degree[jnode] > 0 && !self.linked(inode, jnode) {
                    // A new connection is a non-zero coefficient in the
                    // factorized matrix.
                    self.ncoeffs += 1;
                    self.adj[inode].push(Adj { node: jnode, link: self.ncoeffs });
                    self.adj[jnode].push(Adj { node: inode, link: self.ncoeffs });
                    degree[inode] += 1;
                    degree[jnode] += 1;
                }
            }
        }
    }

    fn linked(&self, i: usize, j: usize) -> bool {
        self.adj[i].iter().any(|a| a.node == j)
    }

    /// Stores the row indexes of the non-zeros of each column of the lower
    /// triangle of the factorized matrix.
    fn store_sparse(&mut self, n: usize) {
        self.xlnz = vec![0; n + 2];
        self.nzsub = vec![0; self.ncoeffs + 2];
        self.lnz = vec![0; self.ncoeffs + 2];
        let mut k = 0;
        self.xlnz[1] = 1;
        for i in 1..=n {
            let mut m = 0;
            let ii = self.order[i];
            for a in &self.adj[ii] {
                let j = self.row[a.node];
                if j > i && j <= n {
                    m += 1;
                    k += 1;
                    self.nzsub[k] = j;
                    self.lnz[k] = a.link;
                }
            }
            self.xlnz[i + 1] = self.xlnz[i] + m;
        }
    }

    /// Sorts row indexes within each column of `nzsub` by transposing the
    /// structure twice.
    fn order_sparse(&mut self, n: usize) {
        let mut xlnzt = vec![0usize; n + 2];
        let mut nzsubt = vec![0usize; self.ncoeffs + 2];
        let mut lnzt = vec![0usize; self.ncoeffs + 2];
        let mut nzt = vec![0usize; n + 2];

        for i in 1..=n {
            for k in self.xlnz[i]..self.xlnz[i + 1] {
                nzt[self.nzsub[k]] += 1;
            }
        }
        xlnzt[1] = 1;
        for i in 1..=n {
            xlnzt[i + 1] = xlnzt[i] + nzt[i];
        }

        transpose(n, &self.xlnz, &self.nzsub, &self.lnz, &xlnzt, &mut nzsubt, &mut lnzt, &mut nzt);
        let (xlnz, mut nzsub, mut lnz) = (self.xlnz.clone(), self.nzsub.clone(), self.lnz.clone());
        transpose(n, &xlnzt, &nzsubt, &lnzt, &xlnz, &mut nzsub, &mut lnz, &mut nzt);
        self.nzsub = nzsub;
        self.lnz = lnz;
    }

    /// Solves the sparse symmetric system `A x = B` where the diagonal is
    /// `aii`, off-diagonals are `aij` and `f` holds B on entry and the
    /// solution on exit.
    ///
    /// Returns the 1-based row at which the matrix proved ill-conditioned
    /// (non-positive pivot), if any.
    pub fn lin_solve(&mut self, n: usize) -> Result<(), usize> {
        let mut temp = vec![0.0f64; n + 1];
        let mut link = vec![0usize; n + 1];
        let mut first = vec![0usize; n + 1];

        // Numerical factorization of A into L, column by column.
        for j in 1..=n {
            // Apply every column L(*,k) that affects L(*,j).
            let mut diagj = 0.0;
            let mut k = link[j];
            while k != 0 {
                let newk = link[k];
                let kfirst = first[k];
                let ljk = self.aij[self.lnz[kfirst]];
                diagj += ljk * ljk;
                let istrt = kfirst + 1;
                let istop = self.xlnz[k + 1] - 1;
                if istop >= istrt {
                    first[k] = istrt;
                    let isub = self.nzsub[istrt];
                    link[k] = link[isub];
                    link[isub] = k;
                    for i in istrt..=istop {
                        let isub = self.nzsub[i];
                        temp[isub] += self.aij[self.lnz[i]] * ljk;
                    }
                }
                k = newk;
            }

            diagj = self.aii[j] - diagj;
            if diagj <= 0.0 {
                return Err(j);
            }
            diagj = diagj.sqrt();
            self.aii[j] = diagj;
            let istrt = self.xlnz[j];
            let istop = self.xlnz[j + 1] - 1;
            if istop >= istrt {
                first[j] = istrt;
                let isub = self.nzsub[istrt];
                link[j] = link[isub];
                link[isub] = j;
                for i in istrt..=istop {
                    let isub = self.nzsub[i];
                    let bj = (self.aij[self.lnz[i]] - temp[isub]) / diagj;
                    self.aij[self.lnz[i]] = bj;
                    temp[isub] = 0.0;
                }
            }
        }

        // Forward substitution.
        for j in 1..=n {
            let bj = self.f[j] / self.aii[j];
            self.f[j] = bj;
            for i in self.xlnz[j]..self.xlnz[j + 1] {
                let isub = self.nzsub[i];
                self.f[isub] -= self.aij[self.lnz[i]] * bj;
            }
        }

        // Backward substitution.
        for j in (1..=n).rev() {
            let mut bj = self.f[j];
            for i in self.xlnz[j]..self.xlnz[j + 1] {
                let isub = self.nzsub[i];
                bj -= self.aij[self.lnz[i]] * self.f[isub];
            }
            self.f[j] = bj / self.aii[j];
        }
        Ok(())
    }
}

/// Determines the sparse storage scheme for the transpose of a matrix.
#[allow(clippy::too_many_arguments)]
fn transpose(
    n: usize,
    il: &[usize],
    jl: &[usize],
    xl: &[usize],
    ilt: &[usize],
    jlt: &mut [usize],
    xlt: &mut [usize],
    nzt: &mut [usize],
) {
    nzt.iter_mut().for_each(|v| *v = 0);
    for i in 1..=n {
        for k in il[i]..il[i + 1] {
            let j = jl[k];
            let kk = ilt[j] + nzt[j];
            jlt[kk] = i;
            xlt[kk] = xl[k];
            nzt[j] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinkType, NodeType};

    fn chain_network(njuncs: usize) -> Network {
        let mut net = Network::new();
        net.add_node("R", NodeType::Reservoir).unwrap();
        for i in 0..njuncs {
            net.add_node(&format!("J{}", i + 1), NodeType::Junction).unwrap();
        }
        net.add_link("P0", LinkType::Pipe, "R", "J1").unwrap();
        for i in 1..njuncs {
            net.add_link(&format!("P{}", i), LinkType::Pipe, &format!("J{}", i), &format!("J{}", i + 1))
                .unwrap();
        }
        net
    }

    #[test]
    fn chain_produces_no_fill_in() {
        let net = chain_network(5);
        let solver = Solver::create(&net);
        // A path graph factorizes with no extra non-zeros.
        assert_eq!(solver.ncoeffs, net.nlinks());
        // Every junction appears exactly once in the elimination order.
        let mut seen = vec![false; net.nnodes() + 1];
        for k in 1..=net.njuncs() {
            assert!(!seen[solver.order[k]]);
            seen[solver.order[k]] = true;
        }
    }

    #[test]
    fn parallel_links_share_a_coefficient_slot() {
        let mut net = Network::new();
        net.add_node("R", NodeType::Reservoir).unwrap();
        net.add_node("J1", NodeType::Junction).unwrap();
        net.add_link("P1", LinkType::Pipe, "R", "J1").unwrap();
        net.add_link("P2", LinkType::Pipe, "R", "J1").unwrap();
        let solver = Solver::create(&net);
        assert_eq!(solver.ndx[1], 1);
        assert_eq!(solver.ndx[2], 1);
    }

    #[test]
    fn nzsub_rows_are_ascending_within_columns() {
        // A loop grid gives some fill-in to exercise the ordering passes.
        let mut net = Network::new();
        net.add_node("R", NodeType::Reservoir).unwrap();
        for i in 1..=6 {
            net.add_node(&format!("J{}", i), NodeType::Junction).unwrap();
        }
        let pipes = [
            ("R", "J1"),
            ("J1", "J2"),
            ("J2", "J3"),
            ("J3", "J1"),
            ("J3", "J4"),
            ("J4", "J5"),
            ("J5", "J6"),
            ("J6", "J2"),
        ];
        for (i, (a, b)) in pipes.iter().enumerate() {
            net.add_link(&format!("P{}", i), LinkType::Pipe, a, b).unwrap();
        }
        let solver = Solver::create(&net);
        for i in 1..=net.njuncs() {
            let col = &solver.nzsub[solver.xlnz[i]..solver.xlnz[i + 1]];
            assert!(col.windows(2).all(|w| w[0] < w[1]), "column {} not sorted", i);
        }
    }

    #[test]
    fn solves_a_dense_spd_system() {
        // 3-junction triangle fed from a reservoir; build the symbolic
        // structure, then load a known SPD matrix and check the solution.
        let mut net = Network::new();
        net.add_node("R", NodeType::Reservoir).unwrap();
        for i in 1..=3 {
            net.add_node(&format!("J{}", i), NodeType::Junction).unwrap();
        }
        net.add_link("P1", LinkType::Pipe, "R", "J1").unwrap();
        net.add_link("P2", LinkType::Pipe, "J1", "J2").unwrap();
        net.add_link("P3", LinkType::Pipe, "J2", "J3").unwrap();
        net.add_link("P4", LinkType::Pipe, "J3", "J1").unwrap();
        let mut solver = Solver::create(&net);
        let n = net.njuncs();

        // A = D + offdiagonals of -1 on every junction-junction link;
        // diagonals of 4 keep it diagonally dominant.
        for i in 1..=n {
            solver.aii[i] = 4.0;
        }
        for k in 2..=4 {
            // Links P2..P4 connect junction pairs.
            solver.aij[solver.ndx[k]] = -1.0;
        }
        // RHS chosen so that x = (1, 1, 1).
        for i in 1..=n {
            solver.f[i] = 2.0;
        }
        solver.lin_solve(n).unwrap();
        for i in 1..=n {
            assert!((solver.f[i] - 1.0).abs() < 1e-12, "row {} = {}", i, solver.f[i]);
        }
    }

    #[test]
    fn reports_ill_conditioned_row() {
        let net = chain_network(2);
        let mut solver = Solver::create(&net);
        solver.aii[1] = 1.0;
        solver.aii[2] = 0.0; // Non-positive pivot at row 2.
        let err = solver.lin_solve(2).unwrap_err();
        assert_eq!(err, 2);
    }
}
