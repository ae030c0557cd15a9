use log::debug;

use crate::engine::{CurveKind, Engine};
use crate::group::{Curve, Point};
use crate::multicore::log2_floor;
use crate::task::{Param, Task};
use crate::{Error, Result};

/// Window width in bits, indexed by `log2_floor` of the number of bases.
const PT_SIZES: [u32; 32] = [
    1, 1, 1, 1, 2, 3, 4, 5, 6, 7, 7, 8, 9, 10, 11, 12, 13, 13, 14, 15, 16, 16, 17, 17, 17, 17,
    17, 17, 17, 17, 17, 17,
];

fn window_bits(n: usize) -> u32 {
    PT_SIZES[(log2_floor(n) as usize).min(PT_SIZES.len() - 1)]
}

fn num_windows(scalar_bits: usize, c: u32) -> usize {
    (scalar_bits - 1) / c as usize + 1
}

/// One outer chunk of bases and the windows it was split into.
struct Region {
    c: u32,
    windows: usize,
}

impl Engine {
    /// Computes `sum s_i * P_i` for `n` bases of `width` bytes and `n`
    /// plain little-endian scalars of `scalars.len() / n` bytes.
    ///
    /// The bases are cut into chunks and every chunk into windows of
    /// scalar bits; each (chunk, window) pair is one task that sorts the
    /// bases into buckets by their digit.
    pub(crate) fn multi_exp(
        &self,
        kind: CurveKind,
        width: usize,
        affine: bool,
        bases: &[u8],
        scalars: &[u8],
    ) -> Result<Point> {
        let curve = Curve::new(self, kind);
        if bases.len() % width != 0 {
            return Err(Error::InvalidLength {
                expected: (bases.len() / width + 1) * width,
                actual: bases.len(),
            });
        }
        let n = bases.len() / width;
        if n == 0 {
            if !scalars.is_empty() {
                return Err(Error::LengthMismatch);
            }
            return curve.zero();
        }
        if scalars.is_empty() || scalars.len() % n != 0 {
            return Err(Error::LengthMismatch);
        }
        let scalar_size = scalars.len() / n;
        let scalar_bits = scalar_size * 8;

        let config = self.config();
        let n_windows = num_windows(scalar_bits, window_bits(n));
        let chunk = (n * n_windows / self.num_workers())
            .max(config.msm_min_chunk)
            .min(config.msm_max_chunk)
            .max(1);

        let out_len = 3 * curve.n8();
        let func = format!(
            "{}_{}",
            kind.prefix(),
            if affine {
                "multiexpAffine_chunk"
            } else {
                "multiexp_chunk"
            }
        );

        let mut tasks = Vec::new();
        let mut regions = Vec::new();
        for (b, s) in bases
            .chunks(chunk * width)
            .zip(scalars.chunks(chunk * scalar_size))
        {
            let len = b.len() / width;
            let c = window_bits(len);
            let windows = num_windows(scalar_bits, c);
            for w in 0..windows {
                let mut task = Task::new();
                let pb = task.alloc_set(b.to_vec());
                let ps = task.alloc_set(s.to_vec());
                let r = task.alloc(out_len);
                task.call(
                    func.as_str(),
                    &[
                        pb,
                        ps,
                        Param::Val(scalar_size as u32),
                        Param::Val(len as u32),
                        Param::Val(w as u32 * c),
                        Param::Val(c),
                        r,
                    ],
                )
                .get(r, out_len);
                tasks.push(task);
            }
            regions.push(Region { c, windows });
        }

        debug!(
            "multiexp of {} bases: {} chunks of up to {}, {} tasks",
            n,
            regions.len(),
            chunk,
            tasks.len()
        );
        let outputs = self.pool().compute_all(tasks)?;
        let mut partials = outputs.into_iter();

        let mut total = curve.zero()?;
        for region in regions {
            let sums = partials
                .by_ref()
                .take(region.windows)
                .map(|out| {
                    out.into_iter()
                        .next()
                        .map(Point::Jacobian)
                        .ok_or_else(|| Error::Task("multiexp task returned nothing".into()))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut acc = curve.zero()?;
            for sum in sums.iter().rev() {
                if !curve.is_zero(&acc)? {
                    for _ in 0..region.c {
                        acc = curve.double(&acc)?;
                    }
                }
                acc = curve.add(&acc, sum)?;
            }
            total = curve.add(&total, &acc)?;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_table() {
        assert_eq!(window_bits(1), 1);
        assert_eq!(window_bits(16), 2);
        assert_eq!(window_bits(1 << 10), 7);
        assert_eq!(window_bits(1 << 20), 16);
        assert_eq!(window_bits(1 << 40), 17);
    }

    #[test]
    fn windows_cover_the_scalar() {
        assert_eq!(num_windows(256, 1), 256);
        assert_eq!(num_windows(256, 7), 37);
        assert_eq!(num_windows(256, 16), 16);
        assert_eq!(num_windows(8, 17), 1);
    }
}
