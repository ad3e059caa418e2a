mod logging;

use linerpc::Server;

const ADDR: &str = "0.0.0.0:1337";

fn main() {
    logging::init_logging();

    let mut rpc_server = Server::new(ADDR.to_owned());
    arith::register(&mut rpc_server);

    if let Err(err) = rpc_server.start() {
        eprintln!("Fatal error: {}", err);
        std::process::exit(1);
    }
}
