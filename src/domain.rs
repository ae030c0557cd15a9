//! This module contains the distributed FFT over vectors of `Fr` elements
//! or curve points.
//!
//! A transform of `2^bits` elements is bit-reversed on the calling thread,
//! split into chunks and handed to the worker pool in rounds: one round of
//! "mix" tasks runs every butterfly level that fits inside a chunk, then
//! one round per remaining level joins pairs of chunks with a twist. A
//! round is only submitted once every result of the previous one is in.
//!
//! The root-of-unity table covers domains up to `2^S`. A domain of
//! `2^(S+1)` is handled as the subgroup of order `2^S` together with one
//! coset `c * H`: the vector is split into two halves that are mixed with
//! [`fftJoinExt`] and transformed independently. Anything larger is
//! rejected.
//!
//! [`fftJoinExt`]: crate::kernel

use log::debug;

use crate::engine::{CurveKind, Engine};
use crate::field::Element;
use crate::multicore::Output;
use crate::task::{Param, Task};
use crate::{Error, Result};

/// How the elements of a vector are laid out in kernel memory.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    prefix: &'static str,
    /// Width the butterflies work in.
    width: usize,
    /// Width of the affine form, for curve points.
    affine_width: Option<usize>,
}

impl Layout {
    pub(crate) fn scalar(n8: usize) -> Layout {
        Layout {
            prefix: "frm",
            width: n8,
            affine_width: None,
        }
    }

    pub(crate) fn curve(kind: CurveKind, n8: usize) -> Layout {
        Layout {
            prefix: kind.prefix(),
            width: 3 * n8,
            affine_width: Some(2 * n8),
        }
    }

    fn func(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn width_of(&self, affine: bool) -> usize {
        match (affine, self.affine_width) {
            (true, Some(w)) => w,
            _ => self.width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Forward,
    Inverse,
    Lagrange,
}

impl Engine {
    pub(crate) fn fft(
        &self,
        layout: Layout,
        buf: &[u8],
        affine_in: bool,
        affine_out: bool,
    ) -> Result<Vec<u8>> {
        self.transform(layout, buf, affine_in, affine_out, Mode::Forward)
    }

    pub(crate) fn ifft(
        &self,
        layout: Layout,
        buf: &[u8],
        affine_in: bool,
        affine_out: bool,
    ) -> Result<Vec<u8>> {
        self.transform(layout, buf, affine_in, affine_out, Mode::Inverse)
    }

    pub(crate) fn lagrange_evaluations(
        &self,
        layout: Layout,
        buf: &[u8],
        affine_in: bool,
        affine_out: bool,
    ) -> Result<Vec<u8>> {
        self.transform(layout, buf, affine_in, affine_out, Mode::Lagrange)
    }

    fn transform(
        &self,
        layout: Layout,
        buf: &[u8],
        affine_in: bool,
        affine_out: bool,
        mode: Mode,
    ) -> Result<Vec<u8>> {
        let w_in = layout.width_of(affine_in);
        if buf.len() % w_in != 0 {
            return Err(Error::InvalidLength {
                expected: (buf.len() / w_in + 1) * w_in,
                actual: buf.len(),
            });
        }
        let n = buf.len() / w_in;
        if !n.is_power_of_two() {
            return Err(Error::NotPowerOfTwo);
        }
        let bits = n.trailing_zeros();
        let s = self.tables().s;
        if bits > s + 1 {
            return Err(Error::DomainTooLarge);
        }

        let data = if w_in != layout.width {
            self.convert(layout, buf, "batchToJacobian", w_in, layout.width)?
        } else {
            buf.to_vec()
        };

        let out = if bits <= s {
            let inverse = mode != Mode::Forward;
            single(self.radix2(layout, vec![data], bits, inverse)?)?
        } else {
            self.extended(layout, data, bits, mode)?
        };

        match layout.affine_width {
            Some(w) if affine_out => self.convert(layout, &out, "batchToAffine", layout.width, w),
            _ => Ok(out),
        }
    }

    /// Converts every element of `buf` with a batch kernel function, in
    /// parallel.
    fn convert(
        &self,
        layout: Layout,
        buf: &[u8],
        name: &str,
        w_from: usize,
        w_to: usize,
    ) -> Result<Vec<u8>> {
        let n = buf.len() / w_from;
        if n == 0 {
            return Ok(Vec::new());
        }
        let per_task = (n + self.num_workers() - 1) / self.num_workers();
        let func = layout.func(name);

        let tasks = buf
            .chunks(per_task * w_from)
            .map(|chunk| {
                let len = chunk.len() / w_from;
                let mut task = Task::new();
                let p = task.alloc_set(chunk.to_vec());
                let r = task.alloc(len * w_to);
                task.call(func.as_str(), &[p, Param::Val(len as u32), r])
                    .get(r, len * w_to);
                task
            })
            .collect();

        let outputs = self.pool().compute_all(tasks)?;
        let mut out = Vec::with_capacity(n * w_to);
        for o in outputs {
            out.extend_from_slice(&single(o)?);
        }
        Ok(out)
    }

    /// Elements per chunk for `vectors` transforms of `n` elements run
    /// together.
    fn fft_chunk(&self, n: usize, vectors: usize) -> usize {
        let config = self.config();
        let mut pic = n.min(1usize << config.fft_max_chunk_bits);
        while (n / pic) * vectors < self.num_workers() && pic > config.fft_min_chunk {
            pic /= 2;
        }
        pic
    }

    /// Transforms every vector of `2^bits` elements, round by round in
    /// lockstep.
    fn radix2(
        &self,
        layout: Layout,
        vectors: Vec<Vec<u8>>,
        bits: u32,
        inverse: bool,
    ) -> Result<Vec<Vec<u8>>> {
        let w = layout.width;
        let n = 1usize << bits;
        let fr = self.fr();
        let tables = self.tables();
        let roots = if inverse {
            &tables.roots_inv
        } else {
            &tables.roots
        };

        let pic = self.fft_chunk(n, vectors.len());
        let l2chunk = pic.trailing_zeros();
        let n_chunks = n / pic;
        let factor = if inverse {
            Some(fr.inv(&fr.from_u64(n as u64)?)?)
        } else {
            None
        };

        let mut chunks: Vec<Vec<Vec<u8>>> = vectors
            .into_iter()
            .map(|mut v| {
                bit_reverse(&mut v, w, bits);
                v.chunks(pic * w).map(|c| c.to_vec()).collect()
            })
            .collect();

        let mut tasks = Vec::with_capacity(chunks.len() * n_chunks);
        for chunk in chunks.iter_mut().flat_map(|v| v.iter_mut()) {
            let mut task = Task::new();
            let p = task.alloc_set(std::mem::take(chunk));
            task.call(
                layout.func("fftMix"),
                &[p, Param::Val(pic as u32), Param::Val(inverse as u32)],
            );
            if n_chunks == 1 {
                if let Some(f) = factor.as_ref() {
                    let pf = task.alloc_set(f.as_bytes().to_vec());
                    task.call(layout.func("fftFinal"), &[p, Param::Val(pic as u32), pf]);
                }
            }
            task.get(p, pic * w);
            tasks.push(task);
        }
        debug!(
            "fft of 2^{}: mixing {} chunks of {} elements",
            bits,
            tasks.len(),
            pic
        );
        let outputs = self.pool().compute_all(tasks)?;
        for (chunk, out) in chunks.iter_mut().flat_map(|v| v.iter_mut()).zip(outputs) {
            *chunk = single(out)?;
        }

        for i in (l2chunk + 1)..=bits {
            let n_groups = 1usize << (bits - i);
            let npg = n_chunks / n_groups;
            let inc = &roots[i as usize];
            let last = i == bits;

            let mut tasks = Vec::new();
            let mut placement = Vec::new();
            for (vi, v) in chunks.iter_mut().enumerate() {
                for j in 0..n_groups {
                    for k in 0..npg / 2 {
                        let o1 = j * npg + k;
                        let o2 = o1 + npg / 2;
                        let first = fr.exp(&Element(inc.clone()), &((k * pic) as u64).to_le_bytes())?;

                        let mut task = Task::new();
                        let p1 = task.alloc_set(std::mem::take(&mut v[o1]));
                        let p2 = task.alloc_set(std::mem::take(&mut v[o2]));
                        let pf = task.alloc_set(first.into_bytes());
                        let pi = task.alloc_set(inc.clone());
                        task.call(
                            layout.func("fftJoin"),
                            &[p1, p2, Param::Val(pic as u32), pf, pi],
                        );
                        if last {
                            if let Some(f) = factor.as_ref() {
                                let pm = task.alloc_set(f.as_bytes().to_vec());
                                task.call(layout.func("fftFinal"), &[p1, Param::Val(pic as u32), pm])
                                    .call(layout.func("fftFinal"), &[p2, Param::Val(pic as u32), pm]);
                            }
                        }
                        task.get(p1, pic * w).get(p2, pic * w);
                        tasks.push(task);
                        placement.push((vi, o1, o2));
                    }
                }
            }

            debug!("fft of 2^{}: join level {} with {} tasks", bits, i, tasks.len());
            let outputs = self.pool().compute_all(tasks)?;
            for ((vi, o1, o2), out) in placement.into_iter().zip(outputs) {
                let (a, b) = pair(out)?;
                chunks[vi][o1] = a;
                chunks[vi][o2] = b;
            }
        }

        Ok(chunks.into_iter().map(|v| v.concat()).collect())
    }

    /// Transforms of `2^(S+1)` elements.
    fn extended(&self, layout: Layout, mut data: Vec<u8>, bits: u32, mode: Mode) -> Result<Vec<u8>> {
        let tables = self.tables();
        let v = data.split_off(data.len() / 2);
        let u = data;

        let (lo, hi) = match mode {
            Mode::Forward => {
                let (u, v) = self.join_ext(layout, "fftJoinExt", u, v, &tables.shift, bits)?;
                pair(self.radix2(layout, vec![u, v], bits - 1, false)?)?
            }
            Mode::Inverse => {
                let (u, v) = pair(self.radix2(layout, vec![u, v], bits - 1, true)?)?;
                self.join_ext(layout, "fftJoinExtInv", u, v, &tables.shift_inv, bits)?
            }
            Mode::Lagrange => {
                let (u, v) =
                    self.join_ext(layout, "fftJoinExtLagrange", u, v, &tables.shift_inv, bits)?;
                pair(self.radix2(layout, vec![u, v], bits - 1, true)?)?
            }
        };
        Ok([lo, hi].concat())
    }

    /// Applies one of the coset join functions to two halves, chunk by
    /// chunk. Element `i` is twisted by `inc^i`.
    fn join_ext(
        &self,
        layout: Layout,
        name: &str,
        u: Vec<u8>,
        v: Vec<u8>,
        inc: &[u8],
        bits: u32,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let w = layout.width;
        let n = u.len() / w;
        let pic = self.fft_chunk(n, 1);
        let fr = self.fr();

        let mut tasks = Vec::with_capacity(n / pic);
        for (c, (cu, cv)) in u.chunks(pic * w).zip(v.chunks(pic * w)).enumerate() {
            let first = fr.exp(&Element(inc.to_vec()), &((c * pic) as u64).to_le_bytes())?;

            let mut task = Task::new();
            let p1 = task.alloc_set(cu.to_vec());
            let p2 = task.alloc_set(cv.to_vec());
            let pf = task.alloc_set(first.into_bytes());
            let pi = task.alloc_set(inc.to_vec());
            task.call(
                layout.func(name),
                &[p1, p2, Param::Val(pic as u32), pf, pi, Param::Val(bits)],
            )
            .get(p1, pic * w)
            .get(p2, pic * w);
            tasks.push(task);
        }

        debug!("{} over 2^{} elements in {} tasks", name, bits, tasks.len());
        let outputs = self.pool().compute_all(tasks)?;
        let mut lo = Vec::with_capacity(u.len());
        let mut hi = Vec::with_capacity(v.len());
        for out in outputs {
            let (a, b) = pair(out)?;
            lo.extend_from_slice(&a);
            hi.extend_from_slice(&b);
        }
        Ok((lo, hi))
    }
}

fn missing() -> Error {
    Error::Task("task returned fewer buffers than requested".into())
}

fn single(out: Output) -> Result<Vec<u8>> {
    out.into_iter().next().ok_or_else(missing)
}

fn pair(out: Output) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut out = out.into_iter();
    let a = out.next().ok_or_else(missing)?;
    let b = out.next().ok_or_else(missing)?;
    Ok((a, b))
}

/// Permutes elements of width `w` into bit-reversed index order.
fn bit_reverse(buf: &mut [u8], w: usize, bits: u32) {
    if bits == 0 {
        return;
    }
    let n = 1usize << bits;
    let offset = usize::BITS - bits;
    for i in 0..n {
        let ri = i.reverse_bits() >> offset;
        if i < ri {
            let (a, b) = buf.split_at_mut(ri * w);
            a[i * w..(i + 1) * w].swap_with_slice(&mut b[..w]);
        }
    }
}
