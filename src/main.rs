fn main() {
    anime_bracket_lib::run()
}
