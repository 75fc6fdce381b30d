use std::sync::LazyLock;

/// Runtime hosting every fixture server.
///
/// The player and its fetch threads are synchronous, so tests drive them from
/// plain `#[test]` functions while the servers run here.
pub static SERVER_RT: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("fixture-server")
        .enable_all()
        .build()
        .expect("fixture runtime")
});
