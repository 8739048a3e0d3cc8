//! Per-cell packed chemistry state `[p, T, c_0, ..., c_{K-1}]`.
//!
//! The last specie of the mixture is never stored: it closes the mass balance
//! on unpacking. The buffer keeps its allocation between cells; `resize` only
//! changes the logical length, keeps the common prefix and zeroes new entries.

/// number of leading non-specie entries (pressure, temperature)
pub const N_STATE_HEADER: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ChemistryStateVector {
    data: Vec<f64>,
    len: usize,
}

impl ChemistryStateVector {
    /// Empty state with room for a mixture of `n_species`.
    pub fn with_capacity(n_species: usize) -> Self {
        Self {
            data: Vec::with_capacity(N_STATE_HEADER + n_species),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// number of tracked species currently stored
    pub fn n_tracked(&self) -> usize {
        self.len.saturating_sub(N_STATE_HEADER)
    }

    pub fn resize(&mut self, n: usize) {
        if n > self.data.len() {
            self.data.resize(n, 0.0);
        }
        for v in self.data.iter_mut().take(n).skip(self.len) {
            *v = 0.0;
        }
        self.len = n;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data[..self.len]
    }

    /// Writes `p`, `T` and the first `n_tracked()` species of `c`.
    pub fn pack(&mut self, p: f64, t: f64, c: &[f64]) {
        let n_tracked = self.n_tracked();
        let state = self.as_mut_slice();
        state[0] = p;
        state[1] = t;
        state[N_STATE_HEADER..].copy_from_slice(&c[..n_tracked]);
    }

    /// Copies `p` and `T` back, clamps tracked species at zero and closes the
    /// mass balance with the last specie. Tracked species beyond the stored
    /// ones keep their value in `c` (clamped as well).
    pub fn unpack(&self, c: &mut [f64], t: &mut f64, p: &mut f64) {
        let state = self.as_slice();
        *p = state[0];
        *t = state[1];
        let n_stored = self.n_tracked();
        let n_last = c.len() - 1;
        let mut c_sum = 0.0;
        for i in 0..n_last {
            let value = if i < n_stored {
                state[N_STATE_HEADER + i]
            } else {
                c[i]
            };
            c[i] = value.max(0.0);
            c_sum += c[i];
        }
        c[n_last] = 1.0 - c_sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_preserves_prefix_and_zeroes_new_entries() {
        let mut state = ChemistryStateVector::with_capacity(3);
        state.resize(N_STATE_HEADER + 2);
        state.pack(1e5, 300.0, &[0.1, 0.2, 0.7]);
        state.resize(N_STATE_HEADER + 3);
        assert_eq!(state.as_slice(), &[1e5, 300.0, 0.1, 0.2, 0.0]);

        // shrinking and growing again never resurrects stale values
        state.resize(N_STATE_HEADER);
        state.resize(N_STATE_HEADER + 1);
        assert_eq!(state.as_slice(), &[1e5, 300.0, 0.0]);
    }

    #[test]
    fn unpack_clamps_and_closes_mass_balance() {
        let mut state = ChemistryStateVector::with_capacity(3);
        state.resize(N_STATE_HEADER + 2);
        state.as_mut_slice().copy_from_slice(&[2e5, 900.0, -1e-6, 0.25]);
        let mut c = [0.3, 0.3, 0.4];
        let (mut t, mut p) = (0.0, 0.0);
        state.unpack(&mut c, &mut t, &mut p);
        assert_eq!((p, t), (2e5, 900.0));
        assert_eq!(c[0], 0.0);
        assert_eq!(c[1], 0.25);
        assert_eq!(c[2], 0.75);
        assert_eq!(c.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn unstored_species_keep_their_values() {
        let mut state = ChemistryStateVector::with_capacity(4);
        state.resize(N_STATE_HEADER + 1);
        state.pack(1e5, 300.0, &[0.2, 0.1, 0.3, 0.4]);
        state.as_mut_slice()[2] = 0.15;
        let mut c = [0.2, 0.1, 0.3, 0.4];
        let (mut t, mut p) = (0.0, 0.0);
        state.unpack(&mut c, &mut t, &mut p);
        assert_eq!(&c[..3], &[0.15, 0.1, 0.3]);
        assert!((c[3] - 0.45).abs() < 1e-15);
    }
}
