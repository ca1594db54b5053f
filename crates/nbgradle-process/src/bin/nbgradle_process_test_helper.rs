use std::{
    env,
    io::{self, Read, Write},
    process, thread,
    time::Duration,
};

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    args.next().unwrap_or_else(|| {
        eprintln!("missing value for {flag}");
        process::exit(2);
    })
}

fn number<T: std::str::FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> T {
    let raw = value(args, flag);
    raw.parse().unwrap_or_else(|_| {
        eprintln!("invalid number for {flag}: {raw}");
        process::exit(2);
    })
}

fn main() {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout-lines" => {
                let count: usize = number(&mut args, "--stdout-lines");
                let mut out = io::stdout().lock();
                for idx in 0..count {
                    writeln!(out, "line {idx}").unwrap();
                }
                out.flush().unwrap();
            }
            "--stdout" => {
                let text = value(&mut args, "--stdout");
                println!("{text}");
            }
            "--stderr" => {
                let text = value(&mut args, "--stderr");
                eprintln!("{text}");
            }
            "--echo-stdin" => {
                let mut input = String::new();
                io::stdin().read_to_string(&mut input).unwrap();
                print!("{input}");
                io::stdout().flush().unwrap();
            }
            "--print-env" => {
                let name = value(&mut args, "--print-env");
                println!("{}", env::var(&name).unwrap_or_default());
            }
            "--sleep-ms" => {
                let ms: u64 = number(&mut args, "--sleep-ms");
                thread::sleep(Duration::from_millis(ms));
            }
            "--spawn-child-sleep-ms" => {
                let ms: u64 = number(&mut args, "--spawn-child-sleep-ms");
                let exe = env::current_exe().unwrap();
                let _child = process::Command::new(exe)
                    .args(["--sleep-ms", &ms.to_string()])
                    .spawn()
                    .unwrap();
            }
            "--exit-code" => {
                let code: i32 = number(&mut args, "--exit-code");
                process::exit(code);
            }
            other => {
                eprintln!("unknown argument: {other}");
                process::exit(2);
            }
        }
    }
}
