use arith::{Args, Quotient};
use linerpc::{Client, Result};

const ADDR: &str = "127.0.0.1:1337";

fn main() {
    let mut c = Client::new(ADDR);
    if let Err(err) = c.start() {
        eprintln!("Fatal error: {}", err);
        std::process::exit(1);
    }

    let product: Result<i64> = c.call("Arithmetic", "Multiply", &Args { a: 6, b: 7 });
    match product {
        Ok(r) => println!("6 * 7 = {}", r),
        Err(err) => println!("Multiply failed: {}", err),
    }

    for &(a, b) in &[(10, 3), (-7, 2), (5, 0)] {
        let reply: Result<Quotient> = c.call("Arithmetic", "Divide", &Args { a, b });
        match reply {
            Ok(q) => println!("{} / {} = {} remainder {}", a, b, q.quotient, q.remainder),
            Err(err) => println!("{} / {} failed: {}", a, b, err),
        }
    }
}
