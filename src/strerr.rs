use std::fmt::Display;

pub trait Strerr<T> {
    fn strerr(self) -> Result<T, String>;

    /// Like `strerr`, but prefixes the message with what was being attempted.
    fn context(self, what: impl Display) -> Result<T, String>;
}

impl<T, U: Display> Strerr<T> for Result<T, U> {
    fn strerr(self) -> Result<T, String> {
        self.map_err(|e| e.to_string())
    }

    fn context(self, what: impl Display) -> Result<T, String> {
        self.map_err(|e| format!("{what}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_message() {
        let r: Result<(), &str> = Err("no such file");
        assert_eq!(
            r.context("opening song.mp3"),
            Err("opening song.mp3: no such file".to_string())
        );
    }

    #[test]
    fn ok_passes_through() {
        let r: Result<u8, &str> = Ok(3);
        assert_eq!(r.strerr(), Ok(3));
    }
}
