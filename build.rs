fn main() {
    // Only the firmware build needs the ESP-IDF environment; host tests
    // compile without the `espidf` feature and skip this entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
