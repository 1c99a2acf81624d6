/// Browser helper for talking to POST handlers.
///
/// Defines `qwebPost(path, data, onOk, onFail)`, which resolves to whether
/// the handler answered 200, plus `qwebText(s)` and `qwebJson(value)` that
/// build NUL terminated request bodies. Serve it with
/// [`Server::register_client_script`](crate::Server::register_client_script).
pub const CLIENT_SCRIPT: &str = include_str!("../content/qweb.js");
