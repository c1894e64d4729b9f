fn main() {
    basalt::uci::run();
}
