//! End-to-end pipeline tests: source text in, native config out.

use gantry_core::{translate, TranslateError};

fn output_of(source: &str) -> String {
    translate(source, "test.hap").expect("translation failed").output
}

fn error_of(source: &str) -> TranslateError {
    translate(source, "test.hap").expect_err("expected failure")
}

#[test]
fn minimal_config() {
    let output = output_of("config minimal { global { maxconn: 1000 } }");
    assert!(output.contains("global"));
    assert!(output.contains("maxconn 1000"));
    assert!(!output.contains("frontend"));
    assert!(!output.contains("backend"));
}

#[test]
fn variable_interpolation_reaches_server_line() {
    let output = output_of(
        r#"
config s2 {
    let host = "10.0.1.1"

    backend b {
        servers {
            server s1 { address: "${host}" port: 8080 }
        }
    }
}
"#,
    );
    assert!(output.contains("server s1 10.0.1.1:8080"));
}

#[test]
fn template_spread_fills_server_flags() {
    let output = output_of(
        r#"
config s3 {
    template defaults {
        check: true
        inter: 3s
        rise: 5
        fall: 2
    }

    backend pool {
        servers {
            server web1 {
                address: "10.0.1.1"
                port: 8080
                @defaults
            }
        }
    }
}
"#,
    );
    assert!(output.contains("server web1 10.0.1.1:8080 check inter 3s rise 5 fall 2"));
}

#[test]
fn loop_unrolls_in_order() {
    let output = output_of(
        r#"
config s4 {
    backend pool {
        servers {
            for i in [1..3] {
                server "web${i}" { address: "10.0.1.${i}" port: 8080 }
            }
        }
    }
}
"#,
    );
    let first = output.find("server web1 10.0.1.1:8080").expect("web1");
    let second = output.find("server web2 10.0.1.2:8080").expect("web2");
    let third = output.find("server web3 10.0.1.3:8080").expect("web3");
    assert!(first < second && second < third);
}

#[test]
fn referential_error_names_the_target() {
    let err = error_of(
        r#"
config s5 {
    frontend web {
        bind *:80
        default_backend: nonexistent
    }

    backend servers {
        balance: roundrobin
    }
}
"#,
    );
    assert!(err.to_string().contains("'nonexistent' does not exist"));
}

#[test]
fn mode_violation_is_fatal() {
    let err = error_of(
        r#"
config s6 {
    frontend web {
        bind *:80
        mode: tcp
        option: ["httplog"]
    }
}
"#,
    );
    assert!(err
        .to_string()
        .contains("HTTP option 'httplog' used in TCP mode"));
}

#[test]
fn deterministic_output() {
    let source = r#"
config deterministic {
    global {
        maxconn: 50000
        log "/dev/log" local0 info
    }

    defaults {
        mode: http
        timeout: { connect: 5s client: 50s server: 50s }
    }

    frontend web {
        bind *:80
        acl is_api { path_beg "/api" }
        use_backend api if is_api
        default_backend: app
    }

    backend api {
        balance: leastconn
        servers {
            server api1 { address: "10.0.2.1" port: 8080 check: true }
        }
    }

    backend app {
        balance: roundrobin
        servers {
            for i in [1..4] {
                server "app${i}" { address: "10.0.1.${i}" port: 8080 check: true }
            }
        }
    }
}
"#;
    let first = output_of(source);
    let second = output_of(source);
    assert_eq!(first, second);
}

#[test]
fn order_of_list_directives_is_preserved() {
    let output = output_of(
        r#"
config ordered {
    frontend web {
        bind *:80
        option: ["httplog", "dontlognull", "forwardfor"]
        http-request {
            set_header header: "X-First" value: "1"
            set_header header: "X-Second" value: "2"
        }
    }
}
"#,
    );
    let httplog = output.find("option httplog").unwrap();
    let dontlognull = output.find("option dontlognull").unwrap();
    let forwardfor = output.find("option forwardfor").unwrap();
    assert!(httplog < dontlognull && dontlognull < forwardfor);
    let first = output.find("X-First").unwrap();
    let second = output.find("X-Second").unwrap();
    assert!(first < second);
}

#[test]
fn production_style_config_translates() {
    let source = r#"
config production {
    let www_port = 80
    let tls_port = 443

    global {
        daemon: true
        maxconn: 50000
        log "/dev/log" local0 info
        stats_socket "/var/run/haproxy.sock" {
            level: "admin"
            mode: "660"
        }
        tune.bufsize: 16384
    }

    defaults {
        mode: http
        retries: 3
        option: ["httplog", "dontlognull"]
        timeout: {
            connect: 5s
            client: 50s
            server: 50s
        }
    }

    peers cluster {
        peer lb1 "10.0.0.1" 1024
        peer lb2 "10.0.0.2" 1024
    }

    resolvers dns {
        nameserver primary "8.8.8.8" 53
        timeout_resolve: 1s
    }

    mailers alerts {
        timeout_mail: 10s
        mailer smtp "smtp.example.com" 587
    }

    frontend web {
        bind *:${www_port}
        bind *:${tls_port} ssl { cert: "/etc/ssl/cert.pem" alpn: ["h2", "http/1.1"] }
        monitor_uri: "/health"
        acl is_api { path_beg "/api" }
        route {
            to api if is_api
            default: app
        }
    }

    backend api {
        balance: leastconn
        http-reuse: safe
        retry-on: ["conn-failure", "response-timeout"]
        health-check {
            method: "GET"
            uri: "/api/health"
            expect: status 200
        }
        servers {
            server api1 { address: "10.0.2.1" port: 8080 check: true }
            server api2 { address: "10.0.2.2" port: 8080 check: true }
        }
    }

    backend app {
        balance: roundrobin
        default-server {
            check: true
            inter: 5s
            rise: 2
            fall: 3
        }
        servers {
            for i in [1..3] {
                server "app${i}" { address: "10.0.1.${i}" port: 8080 }
            }
        }
    }
}
"#;
    let translation = translate(source, "production.hap").unwrap();
    let output = &translation.output;

    assert!(output.contains("# Generated HAProxy configuration: production"));
    assert!(output.contains("    daemon"));
    assert!(output.contains("stats socket /var/run/haproxy.sock level admin mode 660"));
    assert!(output.contains("tune.bufsize 16384"));
    assert!(output.contains("peers cluster"));
    assert!(output.contains("peer lb1 10.0.0.1:1024"));
    assert!(output.contains("resolvers dns"));
    assert!(output.contains("timeout resolve 1s"));
    assert!(output.contains("mailers alerts"));
    assert!(output.contains("bind *:80"));
    assert!(output.contains("bind *:443 ssl crt /etc/ssl/cert.pem alpn h2,http/1.1"));
    assert!(output.contains("monitor-uri /health"));
    assert!(output.contains("acl is_api path_beg /api"));
    assert!(output.contains("use_backend api if is_api"));
    assert!(output.contains("default_backend app"));
    assert!(output.contains("balance leastconn"));
    assert!(output.contains("http-reuse safe"));
    assert!(output.contains("retry-on conn-failure,response-timeout"));
    assert!(output.contains("http-check send meth GET uri /api/health"));
    assert!(output.contains("http-check expect status 200"));
    assert!(output.contains("server api1 10.0.2.1:8080 check"));
    assert!(output.contains("default-server check inter 5s rise 2 fall 3"));
    assert!(output.contains("server app1 10.0.1.1:8080"));
    assert!(output.contains("server app3 10.0.1.3:8080"));
}

#[test]
fn inline_lua_scripts_are_extracted() {
    let translation = translate(
        r#"
config scripted {
    lua {
        inline greeter {
            core.register_service("greeter", "http", function(applet)
                applet:set_status(200)
            end)
        }
    }

    frontend web {
        bind *:80
    }
}
"#,
        "test.hap",
    )
    .unwrap();
    assert!(translation.output.contains("lua-load lua/greeter.lua"));
    assert_eq!(translation.lua_files.len(), 1);
    assert_eq!(translation.lua_files[0].0, "greeter");
    assert!(translation.lua_files[0].1.contains("core.register_service"));
}

#[test]
fn warnings_surface_from_all_stages() {
    let translation = translate(
        r#"
config warned {
    import "common/defaults.hcl"

    let unused = 42

    template never_spread {
        check: true
    }

    frontend floating {
        default_backend: pool
    }

    backend pool {
        balance: roundrobin
    }
}
"#,
        "test.hap",
    )
    .unwrap();
    let messages: Vec<&str> = translation
        .warnings
        .iter()
        .map(|w| w.message.as_str())
        .collect();
    assert!(messages.iter().any(|m| m.contains("not inlined")));
    assert!(messages.iter().any(|m| m.contains("never used")));
    assert!(messages.iter().any(|m| m.contains("never referenced")));
    assert!(messages.iter().any(|m| m.contains("no bind directives")));
    assert!(messages.iter().any(|m| m.contains("no servers defined")));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any well-formed single-backend config translates
        /// deterministically, whatever the identifiers and counts.
        #[test]
        fn translation_is_deterministic(
            name in "[a-z][a-z0-9_]{0,12}",
            port in 1u16..65535,
            count in 1i64..6,
        ) {
            let source = format!(
                "config {name} {{ backend pool {{ balance: roundrobin\n servers {{ for i in [1..{count}] {{ server \"s${{i}}\" {{ address: \"10.0.0.${{i}}\"\n port: {port} }} }} }} }} }}"
            );
            let first = translate(&source, "prop.hap").unwrap().output;
            let second = translate(&source, "prop.hap").unwrap().output;
            prop_assert_eq!(&first, &second);
            // Loop expansion count matches the range width.
            let occurrences = first.matches("server s").count();
            prop_assert_eq!(occurrences as i64, count);
        }
    }
}
