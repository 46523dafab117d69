use truckflow::cli::{internal_error, is_user_error, run, user_error};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        if is_user_error(&e) {
            user_error(&format!("{:#}", e));
        }

        // Show the cause chain for system failures
        let mut message = e.to_string();
        let mut indent = 1;
        for cause in e.chain().skip(1) {
            message.push_str(&format!("\n{:indent$}  caused by: {}", "", cause, indent = indent));
            indent += 1;
        }
        internal_error(&message);
    }
}
