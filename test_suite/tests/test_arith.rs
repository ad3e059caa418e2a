#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
    use std::net::{Shutdown, SocketAddr, TcpStream};
    use std::thread;
    use std::time::Duration;

    use arith::{Args, Quotient};
    use linerpc::*;
    use serde_json::{json, Value};

    fn start_server() -> SocketAddr {
        start_server_with(ServerOpt::default())
    }

    fn start_server_with(opt: ServerOpt) -> SocketAddr {
        let mut rpc_server = Server::new("127.0.0.1:0".to_owned());
        arith::register(&mut rpc_server);
        let listener = rpc_server.listen(opt).unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || listener.serve());
        addr
    }

    fn client(addr: SocketAddr) -> Client {
        let mut c = Client::new(&addr.to_string());
        c.opt.read_timeout = Duration::from_secs(5);
        c.start().unwrap();
        c
    }

    /// A raw line-oriented connection for sending hand-written envelopes.
    struct Raw {
        stream: TcpStream,
        reader: BufReader<TcpStream>,
    }

    impl Raw {
        fn connect(addr: SocketAddr) -> Raw {
            let stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let reader = BufReader::new(stream.try_clone().unwrap());
            Raw { stream, reader }
        }

        fn send(&mut self, text: &str) {
            self.stream.write_all(text.as_bytes()).unwrap();
        }

        fn reply(&mut self) -> Reply {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).unwrap();
            assert!(n > 0, "connection closed before a reply arrived");
            serde_json::from_str(&line).unwrap()
        }

        /// True once the server has closed its side. A reset counts, since
        /// the server may close with our bytes still unread.
        fn is_closed(&mut self) -> bool {
            let mut buf = [0u8; 1];
            match self.reader.read(&mut buf) {
                Ok(n) => n == 0,
                Err(err) => err.kind() == ErrorKind::ConnectionReset,
            }
        }
    }

    #[test]
    fn concrete_scenario() {
        let mut c = client(start_server());

        let product: i64 = c.call("Arithmetic", "Multiply", &Args { a: 6, b: 7 }).unwrap();
        assert_eq!(42, product);

        let q: Quotient = c.call("Arithmetic", "Divide", &Args { a: 10, b: 3 }).unwrap();
        assert_eq!(
            Quotient {
                quotient: 3,
                remainder: 1
            },
            q
        );

        let q: Quotient = c.call("Arithmetic", "Divide", &Args { a: -7, b: 2 }).unwrap();
        assert_eq!(
            Quotient {
                quotient: -3,
                remainder: -1
            },
            q
        );

        match c.call::<_, Quotient>("Arithmetic", "Divide", &Args { a: 5, b: 0 }) {
            Err(Error::Server(msg)) => assert_eq!("cannot divide by zero", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn multiply_representative_values() {
        let mut c = client(start_server());
        for &(a, b) in &[(0, 99), (99, 0), (-3, 4), (-3, -4), (12345, 1), (-12345, 1)] {
            let product: i64 = c.call("Arithmetic", "Multiply", &Args { a, b }).unwrap();
            assert_eq!(a * b, product, "{} * {}", a, b);
        }
    }

    #[test]
    fn divide_by_zero_keeps_connection_usable() {
        let mut raw = Raw::connect(start_server());

        raw.send("{\"method\":\"Arithmetic.Divide\",\"params\":[{\"A\":5,\"B\":0}],\"id\":1}\n");
        let reply = raw.reply();
        assert_eq!(json!(1), reply.id);
        assert_eq!(None, reply.result);
        assert_eq!(Some("cannot divide by zero".to_owned()), reply.error);

        raw.send("{\"method\":\"Arithmetic.Divide\",\"params\":[{\"A\":9,\"B\":4}],\"id\":2}\n");
        let reply = raw.reply();
        assert_eq!(json!(2), reply.id);
        assert_eq!(Some(json!({"Quotient": 2, "Remainder": 1})), reply.result);
        assert_eq!(None, reply.error);
    }

    #[test]
    fn unknown_method_keeps_connection_open() {
        let mut raw = Raw::connect(start_server());

        raw.send("{\"method\":\"Arithmetic.Subtract\",\"params\":[{\"A\":5,\"B\":1}],\"id\":\"s\"}\n");
        let reply = raw.reply();
        assert_eq!(json!("s"), reply.id);
        assert_eq!(
            Some("rpc: can't find method Arithmetic.Subtract".to_owned()),
            reply.error
        );

        raw.send("{\"method\":\"Geometry.Area\",\"params\":[{}],\"id\":\"g\"}\n");
        let reply = raw.reply();
        assert_eq!(
            Some("rpc: can't find service Geometry.Area".to_owned()),
            reply.error
        );

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":5,\"B\":1}],\"id\":\"m\"}\n");
        let reply = raw.reply();
        assert_eq!(json!("m"), reply.id);
        assert_eq!(Some(json!(5)), reply.result);
    }

    #[test]
    fn invalid_params_keep_connection_open() {
        let mut raw = Raw::connect(start_server());

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":\"six\",\"B\":7}],\"id\":1}\n");
        let reply = raw.reply();
        assert_eq!(json!(1), reply.id);
        assert!(reply.error.unwrap().starts_with("rpc: invalid params"));

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":{\"A\":6,\"B\":7},\"id\":2}\n");
        assert!(raw.reply().is_error());

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":6,\"B\":7}],\"id\":3}\n");
        assert_eq!(Some(json!(42)), raw.reply().result);
    }

    #[test]
    fn reply_ids_follow_call_order() {
        let mut raw = Raw::connect(start_server());
        let ids = vec![
            json!(7),
            json!("abc"),
            json!(null),
            json!(-1),
            json!({"nested": [1, 2]}),
            json!(3.5),
        ];

        let mut batch = String::new();
        for (i, id) in ids.iter().enumerate() {
            let method = if i % 2 == 0 { "Divide" } else { "Multiply" };
            let b = if i == 2 { 0 } else { i as i64 + 1 };
            let call = json!({
                "method": format!("Arithmetic.{}", method),
                "params": [{"A": 100, "B": b}],
                "id": id,
            });
            batch.push_str(&call.to_string());
            batch.push('\n');
        }
        raw.send(&batch);

        let got: Vec<Value> = ids.iter().map(|_| raw.reply().id).collect();
        assert_eq!(ids, got);
    }

    #[test]
    fn garbage_closes_only_its_connection() {
        let addr = start_server();
        let mut bad = Raw::connect(addr);
        let mut good = Raw::connect(addr);

        bad.send("this is not json\n");
        assert!(bad.is_closed());

        good.send("{\"method\":\"Arithmetic.Divide\",\"params\":[{\"A\":10,\"B\":3}],\"id\":1}\n");
        let reply = good.reply();
        assert_eq!(json!(1), reply.id);
        assert_eq!(Some(json!({"Quotient": 3, "Remainder": 1})), reply.result);
    }

    #[test]
    fn truncated_envelope_closes_connection() {
        let addr = start_server();
        let mut raw = Raw::connect(addr);

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":6,\"B\":7}],\"id\":1}\n");
        assert_eq!(Some(json!(42)), raw.reply().result);

        raw.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":6");
        raw.stream.shutdown(Shutdown::Write).unwrap();
        assert!(raw.is_closed());

        let mut c = client(addr);
        let product: i64 = c.call("Arithmetic", "Multiply", &Args { a: 2, b: 3 }).unwrap();
        assert_eq!(6, product);
    }

    #[test]
    fn oversized_call_closes_only_its_connection() {
        let addr = start_server_with(ServerOpt {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            nodelay: Some(true),
            max_message_size: 256,
        });
        let mut big = Raw::connect(addr);
        let mut good = Raw::connect(addr);

        good.send("{\"method\":\"Arithmetic.Multiply\",\"params\":[{\"A\":6,\"B\":7}],\"id\":1}\n");
        assert_eq!(Some(json!(42)), good.reply().result);

        let call = json!({
            "method": "Arithmetic.Multiply",
            "params": [{"A": 6, "B": 7, "Note": "x".repeat(1024)}],
            "id": 1,
        });
        big.send(&format!("{}\n", call));
        assert!(big.is_closed());

        good.send("{\"method\":\"Arithmetic.Divide\",\"params\":[{\"A\":10,\"B\":3}],\"id\":2}\n");
        let reply = good.reply();
        assert_eq!(json!(2), reply.id);
        assert_eq!(Some(json!({"Quotient": 3, "Remainder": 1})), reply.result);
    }

    #[test]
    fn concurrent_clients() {
        let addr = start_server();
        let workers: Vec<_> = (0..8)
            .map(|n: i64| {
                thread::spawn(move || {
                    let mut c = client(addr);
                    for a in 0..20 {
                        let q: Quotient = c
                            .call("Arithmetic", "Divide", &Args { a: a * n, b: n + 1 })
                            .unwrap();
                        assert_eq!(a * n, q.quotient * (n + 1) + q.remainder);
                    }
                })
            })
            .collect();

        for w in workers {
            w.join().unwrap();
        }
    }
}
