mod simd;
mod threadpool;

pub use simd::dispatch as dispatch_simd;
pub use threadpool::ThreadPool;
