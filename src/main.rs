fn main() -> std::process::ExitCode {
    lumbar_labeler_lib::run()
}
