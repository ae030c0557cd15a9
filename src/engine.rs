use std::cell::{RefCell, RefMut};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use log::info;

use crate::arena::Instance;
use crate::config::EngineConfig;
use crate::curves::{CurveId, CurveParams};
use crate::field::Field;
use crate::group::Curve;
use crate::kernel::{Kernel, KERNEL_VERSION};
use crate::multicore::Worker;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Fr,
    F1,
    F2,
    F6,
    F12,
}

impl FieldKind {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            FieldKind::Fr => "frm",
            FieldKind::F1 => "f1m",
            FieldKind::F2 => "f2m",
            FieldKind::F6 => "f6m",
            FieldKind::F12 => "ftm",
        }
    }

    /// Number of prime-field coefficients in one element.
    pub(crate) fn degree(self) -> usize {
        match self {
            FieldKind::Fr | FieldKind::F1 => 1,
            FieldKind::F2 => 2,
            FieldKind::F6 => 6,
            FieldKind::F12 => 12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CurveKind {
    G1,
    G2,
}

impl CurveKind {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            CurveKind::G1 => "g1m",
            CurveKind::G2 => "g2m",
        }
    }

    /// The field the coordinates live in.
    pub(crate) fn base(self) -> FieldKind {
        match self {
            CurveKind::G1 => FieldKind::F1,
            CurveKind::G2 => FieldKind::F2,
        }
    }
}

/// Powers and roots the transforms need, in raw `Fr` form.
pub(crate) struct FftTables {
    /// `roots[i]` is a primitive `2^i`-th root of unity.
    pub(crate) roots: Vec<Vec<u8>>,
    pub(crate) roots_inv: Vec<Vec<u8>>,
    /// Coset shift used one level beyond the table.
    pub(crate) shift: Vec<u8>,
    pub(crate) shift_inv: Vec<u8>,
    /// Largest radix-2 domain is `2^s`.
    pub(crate) s: u32,
}

impl FftTables {
    fn compute(
        instance: &mut Instance,
        params: &CurveParams,
        table_bits: Option<u32>,
        scratch: [u32; 3],
    ) -> Result<FftTables> {
        let n8 = params.n8r;
        let [a, b, _] = scratch;
        let adicity = instance.invoke("frm_twoAdicity", &[])?;
        let s = table_bits.map_or(adicity, |bits| bits.min(adicity));

        let mut roots = Vec::with_capacity(s as usize + 1);
        let mut roots_inv = Vec::with_capacity(s as usize + 1);
        for i in 0..=s {
            instance.invoke("frm_rootOfUnity", &[i, a])?;
            instance.invoke("frm_inverse", &[a, b])?;
            roots.push(instance.read(a, n8)?);
            roots_inv.push(instance.read(b, n8)?);
        }

        instance.invoke("frm_nqr", &[a])?;
        instance.invoke("frm_square", &[a, a])?;
        instance.invoke("frm_inverse", &[a, b])?;

        Ok(FftTables {
            roots,
            roots_inv,
            shift: instance.read(a, n8)?,
            shift_inv: instance.read(b, n8)?,
            s,
        })
    }
}

/// One curve's arithmetic, backed by a worker pool.
///
/// An engine can be moved between threads, but it is driven from one
/// thread at a time: single-value operations share one synchronous
/// instance, so the type is not `Sync`.
pub struct Engine {
    params: CurveParams,
    config: EngineConfig,
    pool: Worker,
    sync: RefCell<Instance>,
    scratch: [u32; 3],
    tables: FftTables,
}

impl Engine {
    pub fn new(curve: CurveId, config: EngineConfig) -> Result<Engine> {
        Engine::with_kernel(curve.kernel(), config)
    }

    pub fn with_kernel(kernel: Arc<dyn Kernel>, config: EngineConfig) -> Result<Engine> {
        if kernel.version() != KERNEL_VERSION {
            return Err(Error::IncompatibleKernel);
        }
        let params = kernel.params().clone();

        let mut sync = Instance::new(kernel.clone(), config.arena_pages, config.max_arena_pages);
        let slot = (12 * params.n8q).max(params.n8r);
        let scratch = [sync.alloc(slot)?, sync.alloc(slot)?, sync.alloc(slot)?];
        sync.arena_mut().set_base();

        let tables = FftTables::compute(&mut sync, &params, config.fft_table_bits, scratch)?;
        let pool = Worker::new(kernel, &config)?;

        info!(
            "{} engine ready with {} workers, radix-2 domains up to 2^{}",
            params.name,
            pool.num_workers(),
            tables.s
        );

        Ok(Engine {
            params,
            config,
            pool,
            sync: RefCell::new(sync),
            scratch,
            tables,
        })
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Largest radix-2 transform is `2^fft_bits()` elements; one more level
    /// is available through the coset extension.
    pub fn fft_bits(&self) -> u32 {
        self.tables.s
    }

    /// Stops the worker pool. Synchronous operations keep working; bulk
    /// operations fail with [`Error::WorkerLost`].
    pub fn terminate(&mut self) {
        self.pool.terminate();
    }

    /// Enters a synchronous section on the engine's own instance.
    /// Allocations made inside it are released when the guard drops.
    pub fn start_sync_op(&self) -> Result<SyncOp<'_>> {
        let instance = self
            .sync
            .try_borrow_mut()
            .map_err(|_| Error::NestedSyncOp)?;
        let mark = instance.arena().mark();
        Ok(SyncOp { instance, mark })
    }

    pub fn fr(&self) -> Field<'_> {
        Field::new(self, FieldKind::Fr)
    }

    pub fn f1(&self) -> Field<'_> {
        Field::new(self, FieldKind::F1)
    }

    pub fn f2(&self) -> Field<'_> {
        Field::new(self, FieldKind::F2)
    }

    pub fn f6(&self) -> Field<'_> {
        Field::new(self, FieldKind::F6)
    }

    pub fn f12(&self) -> Field<'_> {
        Field::new(self, FieldKind::F12)
    }

    /// The pairing target group, as a subgroup of `F12`.
    pub fn gt(&self) -> Field<'_> {
        self.f12()
    }

    pub fn g1(&self) -> Curve<'_> {
        Curve::new(self, CurveKind::G1)
    }

    pub fn g2(&self) -> Curve<'_> {
        Curve::new(self, CurveKind::G2)
    }

    pub(crate) fn pool(&self) -> &Worker {
        &self.pool
    }

    pub(crate) fn tables(&self) -> &FftTables {
        &self.tables
    }

    pub(crate) fn field_width(&self, kind: FieldKind) -> usize {
        match kind {
            FieldKind::Fr => self.params.n8r,
            _ => kind.degree() * self.params.n8q,
        }
    }

    /// Calls `func` with up to two inputs in the scratch slots. When
    /// `out_len` is non-zero the last argument is the result slot and its
    /// contents are returned.
    pub(crate) fn sync_call(
        &self,
        func: &str,
        inputs: &[&[u8]],
        out_len: usize,
    ) -> Result<(u32, Vec<u8>)> {
        let mut op = self.start_sync_op()?;
        let mut args = Vec::with_capacity(3);
        for (slot, input) in self.scratch.iter().zip(inputs.iter()) {
            op.write(*slot, input)?;
            args.push(*slot);
        }
        if out_len > 0 {
            args.push(self.scratch[2]);
        }
        let ret = op.invoke(func, &args)?;
        let out = if out_len > 0 {
            op.read(self.scratch[2], out_len)?
        } else {
            Vec::new()
        };
        Ok((ret, out))
    }
}

/// An active synchronous section. Dropping it ends the section and frees
/// what was allocated inside it.
pub struct SyncOp<'a> {
    instance: RefMut<'a, Instance>,
    mark: usize,
}

impl<'a> Deref for SyncOp<'a> {
    type Target = Instance;

    fn deref(&self) -> &Instance {
        &self.instance
    }
}

impl<'a> DerefMut for SyncOp<'a> {
    fn deref_mut(&mut self) -> &mut Instance {
        &mut self.instance
    }
}

impl<'a> Drop for SyncOp<'a> {
    fn drop(&mut self) {
        let mark = self.mark;
        self.instance.arena_mut().restore(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{Bn128, CurveParams};
    use crate::kernel::Trap;

    fn engine() -> Engine {
        Engine::new(CurveId::Bn128, EngineConfig::default().with_workers(2)).unwrap()
    }

    #[test]
    fn sync_ops_do_not_nest() {
        let engine = engine();
        let outer = engine.start_sync_op().unwrap();
        assert!(matches!(engine.start_sync_op(), Err(Error::NestedSyncOp)));
        drop(outer);
        assert!(engine.start_sync_op().is_ok());
    }

    #[test]
    fn sync_op_releases_allocations() {
        let engine = engine();
        let before = engine.start_sync_op().unwrap().arena().mark();
        {
            let mut op = engine.start_sync_op().unwrap();
            op.alloc(1 << 20).unwrap();
        }
        assert_eq!(engine.start_sync_op().unwrap().arena().mark(), before);
    }

    #[test]
    fn tables_are_capped() {
        let config = EngineConfig::default()
            .with_workers(1)
            .with_fft_table_bits(4);
        let engine = Engine::new(CurveId::Bn128, config).unwrap();
        assert_eq!(engine.fft_bits(), 4);
        assert_eq!(engine.tables().roots.len(), 5);
    }

    struct Outdated(CurveParams);

    impl Kernel for Outdated {
        fn version(&self) -> u32 {
            KERNEL_VERSION + 1
        }
        fn params(&self) -> &CurveParams {
            &self.0
        }
        fn invoke(&self, _: &mut [u8], func: &str, _: &[u32]) -> std::result::Result<u32, Trap> {
            Err(Trap::UnknownFunction(func.to_string()))
        }
    }

    #[test]
    fn kernel_version_is_checked() {
        let kernel = Arc::new(Outdated(CurveParams::of::<Bn128>()));
        assert!(matches!(
            Engine::with_kernel(kernel, EngineConfig::default().with_workers(1)),
            Err(Error::IncompatibleKernel)
        ));
    }
}
