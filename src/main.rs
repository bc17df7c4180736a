fn main() -> std::process::ExitCode {
    invoice_crosscheck_lib::run()
}
